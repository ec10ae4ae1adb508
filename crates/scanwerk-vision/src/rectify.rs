// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectifier: warps the region inside a document quad into an
// upright rectangular page image.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_core::Quad;
use scanwerk_core::config::RectifierConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument, warn};

/// Output size for rectifying `quad`: the longer of each pair of opposite
/// edges, rounded to whole pixels.
pub fn rectified_size(quad: &Quad) -> (u32, u32) {
    let [top, right, bottom, left] = quad.edge_lengths();
    let width = top.max(bottom).round() as u32;
    let height = left.max(right).round() as u32;
    (width, height)
}

/// Deskews photographed pages using a four-point homography.
#[derive(Debug, Clone, Default)]
pub struct PerspectiveRectifier {
    config: RectifierConfig,
}

impl PerspectiveRectifier {
    pub fn new(config: RectifierConfig) -> Self {
        Self { config }
    }

    /// Warp the area inside `quad` into a flat `W x H` page.
    ///
    /// `W` and `H` come from [`rectified_size`]. The projective transform maps
    /// top-left to `(0, 0)`, top-right to `(W, 0)`, bottom-right to `(W, H)`
    /// and bottom-left to `(0, H)`; the source is resampled bilinearly through
    /// its inverse.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::DegenerateQuad`] for collapsed quads (zero
    /// width/height, collinear corners) instead of producing a corrupt page.
    #[instrument(skip(self, image), fields(src_w = image.width(), src_h = image.height()))]
    pub fn rectify(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        let (width, height) = rectified_size(quad);
        if width == 0 || height == 0 || quad.is_degenerate() {
            warn!(width, height, area = quad.area(), "Refusing to rectify degenerate quad");
            return Err(ScanwerkError::DegenerateQuad { width, height });
        }

        let (w, h) = (width as f32, height as f32);
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0), // top-left
            (w, 0.0),   // top-right
            (w, h),     // bottom-right
            (0.0, h),   // bottom-left
        ];

        // from_control_points computes the mapping from the quad to `dest`;
        // it fails when the corners admit no unique homography.
        let projection = Projection::from_control_points(quad.to_f32_corners(), dest).ok_or_else(
            || {
                warn!(?quad, "Failed to compute projective transform");
                ScanwerkError::DegenerateQuad { width, height }
            },
        )?;
        debug!(width, height, "Projective transform computed");

        let rgba_input = image.to_rgba8();
        let mut output = RgbaImage::new(width, height);
        warp_into(
            &rgba_input,
            &projection,
            Interpolation::Bilinear,
            Rgba(self.config.fill),
            &mut output,
        );

        info!(out_w = width, out_h = height, "Perspective rectification applied");
        Ok(DynamicImage::ImageRgba8(output))
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::Point;

    fn canvas_with_page(width: u32, height: u32, page: Quad) -> DynamicImage {
        // Dark background with a bright axis-aligned page.
        let mut img = RgbaImage::from_pixel(width, height, Rgba([20, 20, 20, 255]));
        for y in page.top_left.y..page.bottom_left.y {
            for x in page.top_left.x..page.top_right.x {
                img.put_pixel(x as u32, y as u32, Rgba([240, 240, 240, 255]));
            }
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn output_size_uses_longest_opposite_edges() {
        let quad = Quad::new(
            Point::new(40, 20),
            Point::new(140, 20),
            Point::new(170, 120),
            Point::new(10, 120),
        );
        // top = 100, bottom = 160, sides = sqrt(30^2 + 100^2) ~= 104.4
        assert_eq!(rectified_size(&quad), (160, 104));
    }

    #[test]
    fn embedded_square_keeps_its_edge_lengths() {
        let page = Quad::new(
            Point::new(50, 40),
            Point::new(150, 40),
            Point::new(150, 120),
            Point::new(50, 120),
        );
        let image = canvas_with_page(300, 200, page);

        let rectified = PerspectiveRectifier::default()
            .rectify(&image, &page)
            .expect("page is not degenerate");
        assert!((rectified.width() as i64 - 100).abs() <= 1);
        assert!((rectified.height() as i64 - 80).abs() <= 1);

        // The interior of the page is bright after warping.
        let centre = rectified.to_rgba8().get_pixel(50, 40).0;
        assert!(centre[0] > 200, "expected page pixel, got {centre:?}");
    }

    #[test]
    fn skewed_quad_produces_upright_page() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            200,
            Rgba([128, 128, 128, 255]),
        ));
        let quad = Quad::new(
            Point::new(60, 30),
            Point::new(150, 40),
            Point::new(175, 170),
            Point::new(25, 160),
        );
        let (w, h) = rectified_size(&quad);
        let rectified = PerspectiveRectifier::default()
            .rectify(&image, &quad)
            .expect("quad is not degenerate");
        assert_eq!((rectified.width(), rectified.height()), (w, h));
    }

    #[test]
    fn collinear_quad_is_refused() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(50, 50));
        let quad = Quad::new(
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(20, 20),
            Point::new(30, 30),
        );
        let err = PerspectiveRectifier::default()
            .rectify(&image, &quad)
            .unwrap_err();
        assert!(matches!(err, ScanwerkError::DegenerateQuad { .. }));
    }

    #[test]
    fn zero_size_quad_is_refused() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(50, 50));
        let p = Point::new(5, 5);
        let err = PerspectiveRectifier::default()
            .rectify(&image, &Quad::new(p, p, p, p))
            .unwrap_err();
        assert!(matches!(
            err,
            ScanwerkError::DegenerateQuad {
                width: 0,
                height: 0
            }
        ));
    }
}
