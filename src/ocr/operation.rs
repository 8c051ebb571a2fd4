//! Recognition operation state machine
//!
//! Models one asynchronous recognition job as an explicit state machine.
//! Transitions are pure functions of (current state, poll response), which
//! keeps the protocol testable without a network or a real clock.

use serde::Deserialize;

use super::OcrLine;

/// Poll status vocabulary of the recognition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Body of one poll response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOperationResponse {
    pub status: OperationStatus,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub read_results: Vec<ReadResult>,
}

/// One page of recognized text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    #[serde(default)]
    pub lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadLine {
    pub text: String,
    #[serde(default)]
    pub bounding_box: Vec<f64>,
    #[serde(default)]
    pub words: Vec<ReadWord>,
}

#[derive(Debug, Deserialize)]
pub struct ReadWord {
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Lifecycle of one recognition job. `Succeeded` and `Failed` are terminal:
/// further poll responses leave them unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded(Vec<OcrLine>),
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded(_) | OperationState::Failed)
    }

    /// Advance the state machine with one poll response.
    pub fn advance(self, response: &ReadOperationResponse) -> OperationState {
        if self.is_terminal() {
            return self;
        }
        match response.status {
            OperationStatus::NotStarted | OperationStatus::Running => OperationState::Running,
            OperationStatus::Succeeded => OperationState::Succeeded(collect_lines(response)),
            OperationStatus::Failed => OperationState::Failed,
        }
    }
}

/// Flatten the response into lines in reading order, skipping empty text.
/// The service reports confidence per word; the line gets the mean.
fn collect_lines(response: &ReadOperationResponse) -> Vec<OcrLine> {
    let Some(result) = &response.analyze_result else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for page in &result.read_results {
        for line in &page.lines {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }
            let confidence = if line.words.is_empty() {
                0.0
            } else {
                line.words.iter().map(|w| w.confidence).sum::<f64>() / line.words.len() as f64
            };
            lines.push(OcrLine {
                text: text.to_string(),
                bounding_box: line.bounding_box.clone(),
                confidence,
            });
        }
    }
    lines
}
