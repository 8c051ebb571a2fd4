//! Receipt boundary detection
//!
//! Grayscale -> blur -> Canny -> morphological close, then contour tracing
//! and polygon simplification to find the largest four-cornered shape.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::close;
use imageproc::point::Point;
use tracing::debug;

use crate::config::PreprocessSettings;

use super::Quadrilateral;

/// Douglas-Peucker tolerance as a fraction of the contour's perimeter.
const SIMPLIFY_EPSILON_FRACTION: f64 = 0.02;

/// Find the receipt boundary in a grayscale photo.
///
/// Returns `None` when no simplified four-vertex contour covers at least
/// `min_area_fraction` of the image; the caller is expected to substitute
/// the full image rectangle.
pub fn detect_receipt_quad(
    gray: &GrayImage,
    settings: &PreprocessSettings,
) -> Option<Quadrilateral> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let blurred = gaussian_blur_f32(gray, settings.blur_sigma);
    let edges = canny(&blurred, settings.canny_low, settings.canny_high);
    // Seal single-pixel gaps in the boundary before tracing.
    let closed = close(&edges, Norm::LInf, 1);

    let min_area = settings.min_area_fraction * (width as f64) * (height as f64);
    let mut best: Option<(f64, [Point<i32>; 4])> = None;

    for contour in find_contours::<i32>(&closed) {
        if contour.points.len() < 4 {
            continue;
        }
        let perimeter = arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(
            &contour.points,
            SIMPLIFY_EPSILON_FRACTION * perimeter,
            true,
        );
        if approx.len() != 4 {
            continue;
        }
        let area = polygon_area(&approx);
        if area < min_area {
            continue;
        }
        if best.map_or(true, |(current, _)| area > current) {
            best = Some((area, [approx[0], approx[1], approx[2], approx[3]]));
        }
    }

    best.map(|(area, pts)| {
        debug!("receipt boundary found, area {:.0}px²", area);
        Quadrilateral::new([
            (pts[0].x as f32, pts[0].y as f32),
            (pts[1].x as f32, pts[1].y as f32),
            (pts[2].x as f32, pts[2].y as f32),
            (pts[3].x as f32, pts[3].y as f32),
        ])
    })
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let mut acc = 0i64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        acc += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    acc.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Black canvas with a filled white rectangle.
    fn rect_image(canvas: u32, left: u32, top: u32, right: u32, bottom: u32) -> GrayImage {
        GrayImage::from_fn(canvas, canvas, |x, y| {
            if x >= left && x <= right && y >= top && y <= bottom {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_polygon_area_of_square() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn test_detects_large_rectangle() {
        let image = rect_image(200, 30, 40, 170, 160);
        let settings = PreprocessSettings::default();

        let quad = detect_receipt_quad(&image, &settings).expect("boundary not found");
        let [tl, tr, br, bl] = quad.ordered();

        let tolerance = 6.0;
        assert!((tl.0 - 30.0).abs() < tolerance && (tl.1 - 40.0).abs() < tolerance);
        assert!((tr.0 - 170.0).abs() < tolerance && (tr.1 - 40.0).abs() < tolerance);
        assert!((br.0 - 170.0).abs() < tolerance && (br.1 - 160.0).abs() < tolerance);
        assert!((bl.0 - 30.0).abs() < tolerance && (bl.1 - 160.0).abs() < tolerance);
    }

    #[test]
    fn test_small_rectangle_is_rejected() {
        // 40x40 on a 200x200 canvas is 4% of the area, well below the 20%
        // floor.
        let image = rect_image(200, 80, 80, 120, 120);
        let settings = PreprocessSettings::default();

        assert!(detect_receipt_quad(&image, &settings).is_none());
    }

    #[test]
    fn test_blank_image_has_no_boundary() {
        let image = GrayImage::from_pixel(100, 100, Luma([128]));
        let settings = PreprocessSettings::default();

        assert!(detect_receipt_quad(&image, &settings).is_none());
    }
}
