//! trip-tally - receipt photo to structured fields
//!
//! Takes a photograph of a paper receipt, rectifies and cleans it,
//! extracts text through a cloud recognition service, and parses out the
//! vendor, date, total, tax, and line items.
//!
//! Stages: decode -> boundary detection -> perspective rectification ->
//! adaptive binarization -> asynchronous OCR submit/poll -> field parsing.
//! Persistence and any web front end are left to the caller.

pub mod config;
pub mod ocr;
pub mod parse;
pub mod pipeline;
pub mod vision;

pub use pipeline::{Pipeline, PipelineError, ReceiptScan};
