//! Adaptive binarization
//!
//! Per-pixel thresholding against the local mean, so unevenly lit receipt
//! photos still separate ink from paper cleanly.

use image::{GrayImage, Luma};

/// Threshold each pixel against the mean of its local block minus a
/// constant offset. Pixels brighter than the threshold become 255
/// (paper), everything else 0 (ink).
///
/// The block is `(2 * block_radius + 1)` pixels square, clamped at the
/// image edges. Local means are computed from an integral image, so the
/// cost is independent of the block size. Fully deterministic: the same
/// input always produces byte-identical output.
pub fn adaptive_threshold(gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return gray.clone();
    }

    // integral[(y + 1) * (w + 1) + (x + 1)] = sum of pixels in [0..=x, 0..=y]
    let mut integral = vec![0i64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0i64;
        for x in 0..w {
            row_sum += gray.get_pixel(x as u32, y as u32)[0] as i64;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let r = block_radius as i64;
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        let y0 = (y as i64 - r).max(0) as usize;
        let y1 = ((y as i64 + r) as usize).min(h - 1);
        for x in 0..w {
            let x0 = (x as i64 - r).max(0) as usize;
            let x1 = ((x as i64 + r) as usize).min(w - 1);

            let sum = integral[(y1 + 1) * (w + 1) + (x1 + 1)]
                - integral[y0 * (w + 1) + (x1 + 1)]
                - integral[(y1 + 1) * (w + 1) + x0]
                + integral[y0 * (w + 1) + x0];
            let count = ((y1 - y0 + 1) * (x1 - x0 + 1)) as i64;
            let mean = (sum / count) as i32;

            let value = gray.get_pixel(x as u32, y as u32)[0] as i32;
            let level = if value > mean - offset { 255u8 } else { 0u8 };
            out.put_pixel(x as u32, y as u32, Luma([level]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_is_all_paper() {
        let gray = GrayImage::from_pixel(40, 40, Luma([180]));
        let out = adaptive_threshold(&gray, 15, 10);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_dark_block_on_light_background_becomes_ink() {
        let gray = GrayImage::from_fn(64, 64, |x, y| {
            if (24..40).contains(&x) && (24..40).contains(&y) {
                Luma([20])
            } else {
                Luma([230])
            }
        });

        let out = adaptive_threshold(&gray, 15, 10);

        assert_eq!(out.get_pixel(32, 32)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn test_output_is_deterministic() {
        let gray = GrayImage::from_fn(50, 70, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));

        let first = adaptive_threshold(&gray, 15, 10);
        let second = adaptive_threshold(&gray, 15, 10);

        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_gradient_survives_local_thresholding() {
        // A smooth left-to-right ramp has no local contrast anywhere, so a
        // local threshold with an offset should mark everything as paper.
        let gray = GrayImage::from_fn(100, 20, |x, _| Luma([(55 + x) as u8]));
        let out = adaptive_threshold(&gray, 5, 10);
        assert!(out.pixels().all(|p| p[0] == 255));
    }
}
