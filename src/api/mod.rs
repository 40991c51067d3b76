//! HTTP surface.
//!
//! Public routes serve listings and submissions; routes used by rigs (pop,
//! results, heartbeat) and the administrative reset sit behind
//! [`auth::require_authorized`].

pub mod auth;
pub mod error;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::ReadCache;
use crate::config::AuthConfig;
use crate::error::{RaasError, Result};
use crate::scheduler::{Coordinator, Dispatch, JobId, JobOutcome, NewJob, SubmitOutcome};

use types::{
    HardwareStatusResponse, JobResponse, JobResultsRequest, JobResultsResponse, JobsViewResponse,
    PopParams, SubmitJobRequest, SubmitJobResponse,
};

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
    pub cache: Arc<ReadCache>,
    pub auth: Arc<AuthConfig>,
}

impl ApiState {
    pub fn new(coordinator: Arc<Coordinator>, cache: Arc<ReadCache>, auth: AuthConfig) -> Self {
        Self {
            coordinator,
            cache,
            auth: Arc::new(auth),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let privileged = Router::new()
        .route("/job/pop", get(pop_job_handler))
        .route("/job/{id}/results", put(job_results_handler))
        .route("/hardware/{name}/heartbeat", post(heartbeat_handler))
        .route("/reset", get(reset_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_authorized,
        ));

    Router::new()
        .route("/job", get(list_jobs_handler).post(submit_job_handler))
        .route("/job/{id}", get(get_job_handler))
        .route("/hardware", get(hardware_handler))
        .route("/health", get(health_handler))
        .merge(privileged)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: ApiState, shutdown: CancellationToken) -> Result<()> {
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}

pub async fn run_api(addr: SocketAddr, state: ApiState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;
    tracing::info!(addr = %addr, "Starting API server");
    serve(listener, state, shutdown).await?;
    tracing::info!("API server stopped");
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn submit_job_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitJobResponse>)> {
    let Json(payload) = payload?;
    let outcome = state
        .coordinator
        .submit(NewJob::new(
            payload.user,
            payload.project_name,
            payload.source_url,
        ))
        .await?;

    let status = match outcome {
        SubmitOutcome::Created(_) => StatusCode::CREATED,
        SubmitOutcome::Duplicate(_) => StatusCode::OK,
    };
    Ok((
        status,
        Json(SubmitJobResponse {
            job_id: outcome.job().id.to_string(),
            duplicate: outcome.is_duplicate(),
        }),
    ))
}

async fn list_jobs_handler(State(state): State<ApiState>) -> Result<Json<JobsViewResponse>> {
    let view = state.cache.get().await?;
    Ok(Json(JobsViewResponse::from(view.as_ref())))
}

async fn get_job_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>> {
    let id: JobId = id.parse()?;
    let job = state.coordinator.get_job(id).await?;
    Ok(Json(JobResponse::from(&job)))
}

async fn pop_job_handler(
    State(state): State<ApiState>,
    params: std::result::Result<Query<PopParams>, QueryRejection>,
) -> Result<Response> {
    let Query(params) = params?;
    match state.coordinator.dispatch(&params.hardware).await? {
        Dispatch::Assigned(job) => Ok(Json(JobResponse::from(&job)).into_response()),
        Dispatch::NoJobAvailable => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn job_results_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<JobResultsRequest>, JsonRejection>,
) -> Result<Json<JobResultsResponse>> {
    let id: JobId = id.parse()?;
    let Json(payload) = payload?;
    let job = state
        .coordinator
        .complete(
            id,
            JobOutcome {
                output: payload.stdout,
                result_data: payload.data,
                failed: payload.failed,
            },
        )
        .await?;
    Ok(Json(JobResultsResponse {
        job_id: job.id.to_string(),
        status: job.status.to_string(),
    }))
}

async fn hardware_handler(State(state): State<ApiState>) -> Json<Vec<HardwareStatusResponse>> {
    let statuses = state.coordinator.hardware_statuses().await;
    Json(statuses.iter().map(HardwareStatusResponse::from).collect())
}

async fn heartbeat_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    if state.coordinator.heartbeat(&name).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RaasError::HardwareNotFound(name))
    }
}

async fn reset_handler(State(state): State<ApiState>) -> StatusCode {
    state.coordinator.reset().await;
    StatusCode::NO_CONTENT
}
