use reqwest::StatusCode;

use crate::api::auth::SECRET_HEADER;
use crate::api::types::{
    ErrorResponse, HardwareStatusResponse, JobResponse, JobResultsRequest, JobResultsResponse,
    JobsViewResponse, SubmitJobRequest, SubmitJobResponse,
};
use crate::error::{RaasError, Result};

/// Typed client for the HTTP API.
#[derive(Debug, Clone)]
pub struct RaasClient {
    base_url: String,
    secret: Option<String>,
    http: reqwest::Client,
}

impl RaasClient {
    pub fn new(base_url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.secret {
            Some(secret) => req.header(SECRET_HEADER, secret),
            None => req,
        }
    }

    pub async fn submit(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse> {
        let resp = self.http.post(self.url("/job")).json(request).send().await?;
        decode(resp).await
    }

    pub async fn list(&self) -> Result<JobsViewResponse> {
        let resp = self.http.get(self.url("/job")).send().await?;
        decode(resp).await
    }

    pub async fn job(&self, job_id: &str) -> Result<JobResponse> {
        let resp = self
            .http
            .get(self.url(&format!("/job/{job_id}")))
            .send()
            .await?;
        decode(resp).await
    }

    /// `None` when the queue is empty.
    pub async fn pop(&self, hardware: &str) -> Result<Option<JobResponse>> {
        let resp = self
            .authorized(self.http.get(self.url("/job/pop")))
            .query(&[("hardware", hardware)])
            .send()
            .await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode(resp).await.map(Some)
    }

    pub async fn report(
        &self,
        job_id: &str,
        results: &JobResultsRequest,
    ) -> Result<JobResultsResponse> {
        let resp = self
            .authorized(self.http.put(self.url(&format!("/job/{job_id}/results"))))
            .json(results)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn hardware(&self) -> Result<Vec<HardwareStatusResponse>> {
        let resp = self.http.get(self.url("/hardware")).send().await?;
        decode(resp).await
    }

    pub async fn heartbeat(&self, hardware: &str) -> Result<()> {
        let resp = self
            .authorized(
                self.http
                    .post(self.url(&format!("/hardware/{hardware}/heartbeat"))),
            )
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RaasError::HardwareNotFound(hardware.to_string()));
        }
        check(resp).await.map(|_| ())
    }

    pub async fn reset(&self) -> Result<()> {
        let resp = self.authorized(self.http.get(self.url("/reset"))).send().await?;
        check(resp).await.map(|_| ())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let resp = check(resp).await?;
    Ok(resp.json::<T>().await?)
}

/// Turn error statuses back into the matching [`RaasError`].
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(match status {
        StatusCode::NOT_FOUND => RaasError::JobNotFound(message),
        StatusCode::FORBIDDEN => RaasError::Forbidden,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RaasError::Validation(message)
        }
        _ => RaasError::Internal(format!("{status}: {message}")),
    })
}
