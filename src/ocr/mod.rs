//! OCR Layer
//!
//! Client for an asynchronous cloud text-recognition service (Azure Read
//! API wire format): submit an image, receive an operation handle, poll
//! until the job reaches a terminal state, then extract recognized lines.

pub mod client;
pub mod operation;

use serde::Serialize;
use thiserror::Error;

pub use client::{OperationHandle, ReadClient};
pub use operation::{OperationState, OperationStatus, ReadOperationResponse};

/// A recognized line of text in reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrLine {
    /// Recognized text content.
    pub text: String,
    /// Bounding polygon as the service returns it: four corner points
    /// flattened to [x0, y0, x1, y1, x2, y2, x3, y3].
    pub bounding_box: Vec<f64>,
    /// Mean confidence of the line's words (0.0 - 1.0).
    pub confidence: f64,
}

/// Failures of the recognition protocol. Retrying is the caller's policy;
/// none of these are retried internally.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The submission request could not be sent or completed.
    #[error("failed to submit image to the recognition service")]
    Submission(#[source] reqwest::Error),
    /// The service refused the submission.
    #[error("recognition service rejected submission with status {0}")]
    SubmissionRejected(reqwest::StatusCode),
    /// The service accepted the submission but returned no poll URL.
    #[error("recognition service returned no operation-location header")]
    MissingOperationLocation,
    /// The remote operation reported failure.
    #[error("recognition operation failed")]
    Recognition,
    /// The operation did not reach a terminal state within the poll budget.
    /// The remote job may still be running; it is simply abandoned.
    #[error("recognition operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
