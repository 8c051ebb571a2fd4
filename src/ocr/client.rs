//! Read API client
//!
//! Submits a processed receipt image to the recognition endpoint and
//! drives the poll loop. Waits are cooperative (`tokio::time::sleep`), so
//! many receipts can be in flight on one runtime without blocking threads.

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::OcrConfig;

use super::operation::{OperationState, ReadOperationResponse};
use super::{OcrError, OcrLine};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Opaque poll URL returned by the service for one submitted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Client for the asynchronous read/analyze endpoint.
///
/// Endpoint, key, and poll timing are injected via [`OcrConfig`]; nothing
/// is read from ambient process state, so tests can point the client at a
/// fake server.
pub struct ReadClient {
    http: reqwest::Client,
    config: OcrConfig,
}

impl ReadClient {
    pub fn new(config: OcrConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    /// Submit image bytes for recognition.
    ///
    /// A `202 Accepted` with an `Operation-Location` header moves the
    /// operation to the running state; anything else is a submission
    /// failure. No retries happen here.
    pub async fn submit(&self, image: &[u8]) -> Result<OperationHandle, OcrError> {
        let url = format!(
            "{}/vision/{}/read/analyze",
            self.config.endpoint.trim_end_matches('/'),
            self.config.api_version
        );

        let response = self
            .http
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(OcrError::Submission)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::SubmissionRejected(status));
        }

        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(OcrError::MissingOperationLocation)?;

        debug!("submission accepted, polling {location}");
        Ok(OperationHandle(location))
    }

    /// Poll the operation until it reaches a terminal state or the poll
    /// budget is exhausted.
    ///
    /// Transient poll failures (network errors, non-200 responses) keep
    /// the operation running until the deadline. On timeout the remote job
    /// is abandoned, not cancelled.
    pub async fn poll_until_done(
        &self,
        handle: &OperationHandle,
    ) -> Result<Vec<OcrLine>, OcrError> {
        let budget = self.config.max_poll_duration();
        let deadline = Instant::now() + budget;
        let mut state = OperationState::Running;

        loop {
            if Instant::now() >= deadline {
                return Err(OcrError::Timeout(budget));
            }

            match self.fetch_status(handle).await {
                Ok(response) => match state.advance(&response) {
                    OperationState::Succeeded(lines) => {
                        info!("recognition succeeded with {} lines", lines.len());
                        return Ok(lines);
                    }
                    OperationState::Failed => return Err(OcrError::Recognition),
                    next => state = next,
                },
                Err(err) => debug!("poll attempt failed, will retry: {err:#}"),
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Submit and wait for the result in one call.
    pub async fn recognize(&self, image: &[u8]) -> Result<Vec<OcrLine>, OcrError> {
        let handle = self.submit(image).await?;
        self.poll_until_done(&handle).await
    }

    async fn fetch_status(&self, handle: &OperationHandle) -> Result<ReadOperationResponse> {
        let response = self
            .http
            .get(handle.as_str())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
            .send()
            .await
            .context("poll request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("poll returned status {status}");
        }

        response
            .json::<ReadOperationResponse>()
            .await
            .context("poll response was not valid JSON")
    }
}
