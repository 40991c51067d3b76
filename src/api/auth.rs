use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::ApiState;
use crate::error::RaasError;

/// Header carrying the shared secret. The `secret` query parameter is
/// accepted as well for rig scripts that can only set a URL.
pub const SECRET_HEADER: &str = "x-raas-secret";

#[derive(Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// Middleware for privileged routes: rejects with 403 unless the request
/// carries the shared secret and/or comes from an allowed address.
pub async fn require_authorized(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            Query::<SecretQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(q)| q.secret)
        });
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !state.auth.authorize(presented.as_deref(), peer) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            peer = ?peer,
            "Rejected unauthorized request"
        );
        return RaasError::Forbidden.into_response();
    }

    next.run(req).await
}
