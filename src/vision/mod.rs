//! Vision Layer
//!
//! Turns a raw receipt photo into a clean, OCR-friendly bitmap:
//! boundary detection, perspective rectification, and adaptive
//! binarization.

pub mod binarize;
pub mod contour;
pub mod rectify;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::{debug, warn};

use crate::config::PreprocessSettings;

pub use binarize::adaptive_threshold;
pub use contour::detect_receipt_quad;
pub use rectify::{four_point_transform, DegenerateQuadError};

/// Four corners of a receipt boundary in image coordinates.
///
/// Corner order is not guaranteed at construction; [`Quadrilateral::ordered`]
/// produces the canonical top-left, top-right, bottom-right, bottom-left
/// sequence regardless of how the corners were traced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    pub corners: [(f32, f32); 4],
}

impl Quadrilateral {
    pub fn new(corners: [(f32, f32); 4]) -> Self {
        Self { corners }
    }

    /// The full image rectangle, used as a fallback when no receipt
    /// boundary is found.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let w = width.saturating_sub(1) as f32;
        let h = height.saturating_sub(1) as f32;
        Self {
            corners: [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
        }
    }

    /// Corners ordered as top-left, top-right, bottom-right, bottom-left.
    ///
    /// Uses the coordinate sum/difference rule: the top-left corner has the
    /// smallest x + y, the bottom-right the largest, the top-right the
    /// smallest y - x, and the bottom-left the largest. Deterministic for
    /// any input permutation, which contour tracing does not guarantee.
    pub fn ordered(&self) -> [(f32, f32); 4] {
        let pts = self.corners;
        let sum = |p: (f32, f32)| p.0 + p.1;
        let diff = |p: (f32, f32)| p.1 - p.0;

        let mut tl = pts[0];
        let mut br = pts[0];
        let mut tr = pts[0];
        let mut bl = pts[0];
        for &p in &pts[1..] {
            if sum(p) < sum(tl) {
                tl = p;
            }
            if sum(p) > sum(br) {
                br = p;
            }
            if diff(p) < diff(tr) {
                tr = p;
            }
            if diff(p) > diff(bl) {
                bl = p;
            }
        }
        [tl, tr, br, bl]
    }

    /// Scale all corners by a uniform factor.
    pub fn scaled(&self, factor: f32) -> Self {
        let mut corners = self.corners;
        for p in &mut corners {
            p.0 *= factor;
            p.1 *= factor;
        }
        Self { corners }
    }
}

/// Output of the preprocessing stage: the rectified color image plus the
/// binarized bitmap submitted to OCR.
pub struct PreprocessedReceipt {
    /// Quadrilateral actually used for rectification.
    pub quad: Quadrilateral,
    /// Whether the quad came from boundary detection (false = full-frame
    /// fallback).
    pub quad_detected: bool,
    /// Top-down color view of the receipt.
    pub rectified: RgbImage,
    /// Two-level (0/255) bitmap of the rectified receipt.
    pub binarized: GrayImage,
}

/// Decode an uploaded image (jpg/png/webp/bmp/tiff) into pixels.
pub fn load_image(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

/// Detect, rectify, and binarize a receipt photo.
///
/// Boundary detection runs on a downscaled copy for stability on large
/// photos; the corners are mapped back to full resolution before the
/// perspective transform. If no boundary is found, or rectifying the found
/// boundary fails, the full image rectangle is used instead.
pub fn preprocess_receipt(
    image: &DynamicImage,
    settings: &PreprocessSettings,
) -> Result<PreprocessedReceipt, DegenerateQuadError> {
    let rgb = image.to_rgb8();
    let gray = image.to_luma8();
    let (width, height) = rgb.dimensions();

    let longest = width.max(height);
    let quad = if longest > settings.max_detect_dim {
        let scale = settings.max_detect_dim as f32 / longest as f32;
        let dw = ((width as f32 * scale).round() as u32).max(1);
        let dh = ((height as f32 * scale).round() as u32).max(1);
        debug!("detecting boundary on {}x{} downscaled copy", dw, dh);
        let small = image::imageops::resize(&gray, dw, dh, FilterType::Triangle);
        detect_receipt_quad(&small, settings).map(|q| q.scaled(1.0 / scale))
    } else {
        detect_receipt_quad(&gray, settings)
    };

    let mut quad_detected = quad.is_some();
    let mut quad = quad.unwrap_or_else(|| {
        debug!("no receipt boundary found, using full frame");
        Quadrilateral::full_frame(width, height)
    });

    let rectified = match four_point_transform(&rgb, &quad) {
        Ok(img) => img,
        Err(err) if quad_detected => {
            warn!("rectification of detected boundary failed ({err}), using full frame");
            quad_detected = false;
            quad = Quadrilateral::full_frame(width, height);
            four_point_transform(&rgb, &quad)?
        }
        Err(err) => return Err(err),
    };

    let rectified_gray = image::imageops::grayscale(&rectified);
    let binarized = adaptive_threshold(
        &rectified_gray,
        settings.block_radius,
        settings.threshold_offset,
    );

    Ok(PreprocessedReceipt {
        quad,
        quad_detected,
        rectified,
        binarized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform_image(width: u32, height: u32, level: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([level])))
    }

    #[test]
    fn test_full_frame_corners() {
        let quad = Quadrilateral::full_frame(100, 80);
        assert_eq!(
            quad.corners,
            [(0.0, 0.0), (99.0, 0.0), (99.0, 79.0), (0.0, 79.0)]
        );
    }

    #[test]
    fn test_featureless_image_falls_back_to_full_frame() {
        let image = uniform_image(120, 90, 128);
        let settings = PreprocessSettings::default();

        let result = preprocess_receipt(&image, &settings).unwrap();

        assert!(!result.quad_detected);
        assert_eq!(result.quad, Quadrilateral::full_frame(120, 90));
        // Destination size is the quad edge length, so one pixel short of
        // the source on each axis.
        assert_eq!(result.rectified.dimensions(), (119, 89));
        assert_eq!(result.binarized.dimensions(), result.rectified.dimensions());
    }

    #[test]
    fn test_binarized_output_is_two_level() {
        let image = uniform_image(64, 64, 200);
        let settings = PreprocessSettings::default();

        let result = preprocess_receipt(&image, &settings).unwrap();

        assert!(result.binarized.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_scaled_quad() {
        let quad = Quadrilateral::new([(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0)]);
        let scaled = quad.scaled(2.0);
        assert_eq!(scaled.corners[2], (40.0, 40.0));
    }
}
