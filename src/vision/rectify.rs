//! Perspective rectification
//!
//! Maps the detected receipt quadrilateral to an upright rectangle so
//! text rows come out horizontal for OCR.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use thiserror::Error;

use super::Quadrilateral;

/// Smallest usable output edge in pixels. Anything below this cannot hold
/// readable text and risks a singular transform solve.
pub const MIN_OUTPUT_DIM: u32 = 20;

/// The quadrilateral cannot be rectified: corners coincide, the output
/// rectangle would be too small, or the projective solve is singular.
#[derive(Debug, Error)]
#[error("degenerate quadrilateral: {reason}")]
pub struct DegenerateQuadError {
    reason: &'static str,
}

impl DegenerateQuadError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Resample the region inside `quad` into an upright rectangle.
///
/// The destination width is the longer of the two horizontal edges and the
/// height the longer of the two vertical edges, so the output keeps the
/// receipt's apparent aspect ratio. Resampling is bilinear.
pub fn four_point_transform(
    image: &RgbImage,
    quad: &Quadrilateral,
) -> Result<RgbImage, DegenerateQuadError> {
    let [tl, tr, br, bl] = quad.ordered();

    let corners = [tl, tr, br, bl];
    for i in 0..4 {
        for j in (i + 1)..4 {
            if distance(corners[i], corners[j]) < 1e-3 {
                return Err(DegenerateQuadError::new("coincident corners"));
            }
        }
    }

    let max_width = distance(br, bl).max(distance(tr, tl)).round() as u32;
    let max_height = distance(tr, br).max(distance(tl, bl)).round() as u32;
    if max_width < MIN_OUTPUT_DIM || max_height < MIN_OUTPUT_DIM {
        return Err(DegenerateQuadError::new("output rectangle below minimum size"));
    }

    let dst = [
        (0.0, 0.0),
        (max_width as f32 - 1.0, 0.0),
        (max_width as f32 - 1.0, max_height as f32 - 1.0),
        (0.0, max_height as f32 - 1.0),
    ];
    let projection = Projection::from_control_points([tl, tr, br, bl], dst)
        .ok_or_else(|| DegenerateQuadError::new("no projective solution"))?;

    let mut out = RgbImage::new(max_width, max_height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [(f32, f32); 4] = [(5.0, 8.0), (90.0, 10.0), (88.0, 130.0), (3.0, 128.0)];

    #[test]
    fn test_ordering_is_invariant_to_input_permutation() {
        let expected = Quadrilateral::new(QUAD).ordered();

        // All cyclic shifts plus a couple of arbitrary shuffles.
        let permutations: [[usize; 4]; 6] = [
            [0, 1, 2, 3],
            [1, 2, 3, 0],
            [2, 3, 0, 1],
            [3, 0, 1, 2],
            [2, 0, 3, 1],
            [1, 3, 0, 2],
        ];
        for perm in permutations {
            let shuffled = Quadrilateral::new([
                QUAD[perm[0]],
                QUAD[perm[1]],
                QUAD[perm[2]],
                QUAD[perm[3]],
            ]);
            assert_eq!(shuffled.ordered(), expected, "permutation {:?}", perm);
        }
    }

    #[test]
    fn test_rectified_output_invariant_to_input_order() {
        let image = RgbImage::from_fn(100, 140, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));

        let a = four_point_transform(&image, &Quadrilateral::new(QUAD)).unwrap();
        let shuffled = Quadrilateral::new([QUAD[2], QUAD[0], QUAD[3], QUAD[1]]);
        let b = four_point_transform(&image, &shuffled).unwrap();

        assert_eq!(a.dimensions(), b.dimensions());
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_coincident_corners_are_degenerate() {
        let image = RgbImage::new(100, 100);
        let quad = Quadrilateral::new([(0.0, 0.0), (0.0, 0.0), (99.0, 99.0), (0.0, 99.0)]);

        let err = four_point_transform(&image, &quad).unwrap_err();
        assert!(err.to_string().contains("coincident"));
    }

    #[test]
    fn test_tiny_output_is_degenerate() {
        let image = RgbImage::new(100, 100);
        let quad = Quadrilateral::new([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);

        assert!(four_point_transform(&image, &quad).is_err());
    }

    #[test]
    fn test_axis_aligned_quad_keeps_dimensions() {
        let image = RgbImage::from_pixel(80, 60, Rgb([200, 200, 200]));
        let quad = Quadrilateral::full_frame(80, 60);

        let out = four_point_transform(&image, &quad).unwrap();
        assert_eq!(out.dimensions(), (79, 59));
        // Interior of a uniform image stays uniform after warping.
        assert_eq!(out.get_pixel(40, 30), &Rgb([200, 200, 200]));
    }
}
