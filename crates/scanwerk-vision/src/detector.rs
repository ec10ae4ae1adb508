// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad detector: turns a binary document mask into the quadrilateral that
// outlines the page, via blur, Canny edges, border following, and polygon
// simplification.

use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point as ContourPoint;
use scanwerk_core::config::DetectorConfig;
use scanwerk_core::geometry::{Point, Quad, build_quad, polygon_area, scale_quad};
use scanwerk_core::{DetectionResult, Mask};
use tracing::{debug, instrument};

/// Finds the document quadrilateral in a segmentation mask.
///
/// Not finding one is an ordinary outcome (no page in view, a ragged mask, a
/// silhouette that is not four-sided) and is reported as
/// [`DetectionResult::NotDetected`].
#[derive(Debug, Clone, Default)]
pub struct QuadDetector {
    config: DetectorConfig,
}

impl QuadDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the document quad in mask coordinates.
    ///
    /// ## Pipeline
    ///
    /// 1. Gaussian blur (5x5-equivalent) to soften ragged segmentation edges
    /// 2. Canny edge detection (75 / 200)
    /// 3. Border following over the edge map (outer and hole borders alike)
    /// 4. Douglas-Peucker simplification at 2% of each contour's perimeter
    /// 5. Keep four-vertex polygons, ordered with [`build_quad`], that are
    ///    not degenerate (see [`Quad::is_degenerate`])
    /// 6. Pick the one with the largest enclosed area
    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn detect(&self, mask: &Mask) -> DetectionResult {
        if mask.is_empty() {
            debug!("Mask has no document pixels");
            return DetectionResult::NotDetected;
        }

        let blurred = gaussian_blur_f32(mask.as_gray(), self.config.blur_sigma());
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        let contours = find_contours::<i32>(&edges);
        debug!(contour_count = contours.len(), "Contours extracted");

        let mut candidates = 0usize;
        let mut degenerate = 0usize;
        let mut best: Option<(f64, Quad)> = None;

        for contour in &contours {
            if contour.points.len() < 4 {
                continue;
            }
            let epsilon = self.config.approx_epsilon_ratio * arc_length(&contour.points, true);
            let polygon = approximate_closed_polygon(&contour.points, epsilon);
            let Some(quad) = build_quad(&polygon) else {
                continue;
            };

            candidates += 1;
            // Slivers along the image border and near-collinear corners are
            // no better than no detection.
            if quad.is_degenerate() {
                degenerate += 1;
                continue;
            }
            let area = polygon_area(&polygon);
            if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
                best = Some((area, quad));
            }
        }

        match best {
            Some((area, quad)) => {
                debug!(candidates, degenerate, area, ?quad, "Document quad detected");
                DetectionResult::Detected(quad)
            }
            None => {
                debug!(candidates, degenerate, "No usable four-sided contour found");
                DetectionResult::NotDetected
            }
        }
    }

    /// Detect in mask coordinates, then scale the quad into a
    /// `to_width x to_height` image.
    pub fn detect_scaled(&self, mask: &Mask, to_width: u32, to_height: u32) -> DetectionResult {
        let (mask_width, mask_height) = mask.dimensions();
        match self.detect(mask) {
            DetectionResult::Detected(quad) => DetectionResult::Detected(scale_quad(
                &quad,
                mask_width,
                mask_height,
                to_width,
                to_height,
            )),
            DetectionResult::NotDetected => DetectionResult::NotDetected,
        }
    }
}

// -- Polygon simplification ---------------------------------------------------

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at the point farthest from its start into two open
/// chains, each simplified independently, then joined. The start point of a
/// traced contour is arbitrary, so a final pass drops vertices lying within
/// `epsilon` of the segment joining their neighbours.
fn approximate_closed_polygon(contour: &[ContourPoint<i32>], epsilon: f64) -> Vec<Point> {
    if epsilon <= 0.0 || contour.len() < 3 {
        return contour.iter().map(|p| Point::new(p.x, p.y)).collect();
    }

    let first = contour[0];
    let split = contour
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let dx = i64::from(p.x - first.x);
            let dy = i64::from(p.y - first.y);
            dx * dx + dy * dy
        })
        .map_or(0, |(i, _)| i);
    if split == 0 {
        return vec![Point::new(first.x, first.y)];
    }

    let head = approximate_polygon_dp(&contour[..=split], epsilon, false);
    let mut tail_chain = contour[split..].to_vec();
    tail_chain.push(first);
    let tail = approximate_polygon_dp(&tail_chain, epsilon, false);

    // `head` ends at the split point and `tail` runs split -> first, so both
    // of tail's endpoints are already present.
    let mut polygon: Vec<Point> = head.iter().map(|p| Point::new(p.x, p.y)).collect();
    if tail.len() > 2 {
        polygon.extend(tail[1..tail.len() - 1].iter().map(|p| Point::new(p.x, p.y)));
    }

    prune_flat_vertices(polygon, epsilon)
}

/// Drop vertices closer than `epsilon` to the chord between their neighbours,
/// treating the polygon as closed, until none remain or three are left.
fn prune_flat_vertices(mut polygon: Vec<Point>, epsilon: f64) -> Vec<Point> {
    polygon.dedup();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    loop {
        let n = polygon.len();
        if n <= 3 {
            return polygon;
        }
        let flat = (0..n).find(|&i| {
            let prev = polygon[(i + n - 1) % n];
            let next = polygon[(i + 1) % n];
            distance_to_segment(polygon[i], prev, next) < epsilon
        });
        match flat {
            Some(i) => {
                polygon.remove(i);
            }
            None => return polygon,
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (f64::from(p.x), f64::from(p.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (px - ax).hypot(py - ay);
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    (px - (ax + t * dx)).hypot(py - (ay + t * dy))
}

// -- Tests --------------------------------------------------------------------
