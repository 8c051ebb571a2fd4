//! End-to-end receipt processing
//!
//! Wires the vision stages to the OCR client and the field parser. Each
//! invocation owns its buffers; concurrent invocations only share the
//! HTTP client, so many uploads can be processed on one runtime.

use std::io::Cursor;

use anyhow::Result;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::ocr::{OcrError, OcrLine, ReadClient};
use crate::parse::{parse_receipt, ParsedFields};
use crate::vision::{self, DegenerateQuadError, PreprocessedReceipt};

/// Pipeline failure surfaced to the caller. Either a full scan is returned
/// or one of these; partial results are never produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload could not be decoded as an image.
    #[error("failed to decode image")]
    Decode(#[source] image::ImageError),
    /// The processed image could not be re-encoded for submission.
    #[error("failed to encode processed image")]
    Encode(#[source] image::ImageError),
    /// The image is too small or distorted to rectify at all, even with
    /// the full-frame fallback.
    #[error("image has no usable receipt geometry")]
    Rectify(#[from] DegenerateQuadError),
    /// Submission, recognition, or polling against the OCR service failed.
    #[error("text recognition failed")]
    Ocr(#[from] OcrError),
}

/// Complete result of one scan.
#[derive(Debug)]
pub struct ReceiptScan {
    /// Whether a receipt boundary was detected (false = full-frame fallback).
    pub quad_detected: bool,
    /// Rectified color view, PNG-encoded.
    pub rectified_png: Vec<u8>,
    /// Binarized bitmap submitted to OCR, PNG-encoded.
    pub binarized_png: Vec<u8>,
    /// Recognized lines in reading order.
    pub lines: Vec<OcrLine>,
    /// Extracted fields.
    pub fields: ParsedFields,
}

/// The receipt processing pipeline: decode, rectify, binarize, recognize,
/// parse.
pub struct Pipeline {
    ocr: ReadClient,
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let ocr = ReadClient::new(config.ocr.clone())?;
        Ok(Self { ocr, config })
    }

    /// Process one uploaded image from bytes to structured fields.
    ///
    /// The vision stages are CPU-bound and run synchronously within this
    /// invocation; the OCR poll loop is the only suspension point.
    /// Dropping the returned future stops polling (the remote job is not
    /// cancelled).
    pub async fn process(&self, image_bytes: &[u8]) -> Result<ReceiptScan, PipelineError> {
        let image = vision::load_image(image_bytes).map_err(PipelineError::Decode)?;
        debug!("decoded {}x{} image", image.width(), image.height());

        let prep = vision::preprocess_receipt(&image, &self.config.preprocess)?;
        let (rectified_png, binarized_png) = encode_scan_images(&prep)?;

        let lines = self.ocr.recognize(&binarized_png).await?;
        let texts: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
        let fields = parse_receipt(&texts);

        info!(
            "scan complete: {} lines, vendor={:?}, total={:?}",
            lines.len(),
            fields.vendor,
            fields.total
        );

        Ok(ReceiptScan {
            quad_detected: prep.quad_detected,
            rectified_png,
            binarized_png,
            lines,
            fields,
        })
    }
}

fn encode_scan_images(prep: &PreprocessedReceipt) -> Result<(Vec<u8>, Vec<u8>), PipelineError> {
    let rectified_png = encode_png(DynamicImage::ImageRgb8(prep.rectified.clone()))?;
    let binarized_png = encode_png(DynamicImage::ImageLuma8(prep.binarized.clone()))?;
    Ok((rectified_png, binarized_png))
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(PipelineError::Encode)?;
    Ok(buffer)
}
