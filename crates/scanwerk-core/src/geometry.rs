// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry primitives: points, lines, and document quadrilaterals, plus the
// corner ordering, scaling, and quarter-turn rotation used to move a quad
// between image spaces.

use serde::{Deserialize, Serialize};

/// Smallest sine of the turn between consecutive edges for a corner to count
/// as a corner (about 5.7 degrees).
pub const MIN_CORNER_SINE: f64 = 0.1;

/// Integer pixel coordinate in one specific image's coordinate space (y-down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

/// An ordered pair of points. Used for overlay drawing and edge lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub from: Point,
    pub to: Point,
}

impl Line {
    pub const fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn length(&self) -> f64 {
        self.from.distance(&self.to)
    }
}

/// Four corners outlining a document, clockwise in y-down image coordinates.
///
/// Corner labels come from an angular sort around the centroid (see
/// [`build_quad`]). They are only meaningful for a roughly upright document:
/// a page turned close to 45° gets its "top-left" label on whichever corner
/// sorts first, which may be the visually topmost one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quad {
    /// Build a quad from already-labelled corners. No reordering happens.
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Corners in label order: top-left, top-right, bottom-right, bottom-left.
    pub fn points(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// The four closed edges, starting with the top edge.
    pub fn lines(&self) -> [Line; 4] {
        [
            Line::new(self.top_left, self.top_right),
            Line::new(self.top_right, self.bottom_right),
            Line::new(self.bottom_right, self.bottom_left),
            Line::new(self.bottom_left, self.top_left),
        ]
    }

    /// Edge lengths as `[top, right, bottom, left]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        self.lines().map(|line| line.length())
    }

    /// Mean of the four corners.
    pub fn centroid(&self) -> (f64, f64) {
        centroid(&self.points())
    }

    /// Absolute enclosed area (shoelace formula).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points())
    }

    /// True when the quad cannot outline a page: it encloses (almost) no
    /// area, has a collapsed edge, is not convex, or bends by less than
    /// [`MIN_CORNER_SINE`] at some corner (three corners nearly on a line).
    ///
    /// The corner test is scale-free, so a long thin sliver along an image
    /// border is caught even though its area is large. Such quads have no
    /// usable homography and must not be rectified or remembered.
    pub fn is_degenerate(&self) -> bool {
        if self.area() < 1.0 || self.edge_lengths().iter().any(|len| *len < 1.0) {
            return true;
        }
        let turns = self.corner_turns();
        let convex = turns.iter().all(|t| *t > 0.0) || turns.iter().all(|t| *t < 0.0);
        !convex || turns.iter().any(|t| t.abs() < MIN_CORNER_SINE)
    }

    /// Signed sine of the turn at each corner, in label order.
    fn corner_turns(&self) -> [f64; 4] {
        let points = self.points();
        std::array::from_fn(|i| {
            let prev = points[(i + 3) % 4];
            let here = points[i];
            let next = points[(i + 1) % 4];
            let (ax, ay) = (
                f64::from(here.x) - f64::from(prev.x),
                f64::from(here.y) - f64::from(prev.y),
            );
            let (bx, by) = (
                f64::from(next.x) - f64::from(here.x),
                f64::from(next.y) - f64::from(here.y),
            );
            let norm = ax.hypot(ay) * bx.hypot(by);
            if norm == 0.0 { 0.0 } else { (ax * by - ay * bx) / norm }
        })
    }

    /// Re-derive the corner labels from the angular ordering.
    pub fn canonicalized(&self) -> Quad {
        order_by_angle(self.points())
    }

    /// Corners as `f32` pairs in label order, the shape `imageproc` expects
    /// for projective control points.
    pub fn to_f32_corners(&self) -> [(f32, f32); 4] {
        self.points().map(|p| (p.x as f32, p.y as f32))
    }
}

/// Build a [`Quad`] from exactly four unordered candidate vertices.
///
/// Vertices are sorted by `atan2(y - cy, x - cx)` around their centroid and
/// assigned positionally to top-left, top-right, bottom-right, bottom-left.
/// The sort is stable, so vertices with equal angles (duplicates, collinear
/// runs) keep their input order. Returns `None` for any other vertex count.
pub fn build_quad(vertices: &[Point]) -> Option<Quad> {
    let corners: [Point; 4] = vertices.try_into().ok()?;
    Some(order_by_angle(corners))
}

/// Scale every corner from a `from_width x from_height` image into a
/// `to_width x to_height` image.
///
/// Each coordinate is scaled in floating point and truncated once, so chained
/// scalings do not compound rounding beyond one pixel per axis. A zero-sized
/// source leaves the quad unchanged.
pub fn scale_quad(
    quad: &Quad,
    from_width: u32,
    from_height: u32,
    to_width: u32,
    to_height: u32,
) -> Quad {
    if from_width == 0 || from_height == 0 {
        return *quad;
    }
    let sx = f64::from(to_width) / f64::from(from_width);
    let sy = f64::from(to_height) / f64::from(from_height);
    let scale = |p: Point| Point::new((f64::from(p.x) * sx) as i32, (f64::from(p.y) * sy) as i32);

    Quad::new(
        scale(quad.top_left),
        scale(quad.top_right),
        scale(quad.bottom_right),
        scale(quad.bottom_left),
    )
}

/// Rotate every corner by `quarter_turns * 90°` clockwise around the centre
/// of a `width x height` canvas.
///
/// `quarter_turns` is taken modulo 4, so negative values turn
/// counterclockwise. Corner labels stay attached to the same physical points;
/// call [`Quad::canonicalized`] to relabel after the turn.
pub fn rotate_quad(quad: &Quad, quarter_turns: i32, width: u32, height: u32) -> Quad {
    let turns = quarter_turns.rem_euclid(4);
    if turns == 0 {
        return *quad;
    }

    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let rotate = |p: Point| {
        let dx = f64::from(p.x) - cx;
        let dy = f64::from(p.y) - cy;
        let (rx, ry) = match turns {
            1 => (-dy, dx),
            2 => (-dx, -dy),
            _ => (dy, -dx),
        };
        Point::new((cx + rx).round() as i32, (cy + ry).round() as i32)
    };

    Quad::new(
        rotate(quad.top_left),
        rotate(quad.top_right),
        rotate(quad.bottom_right),
        rotate(quad.bottom_left),
    )
}

// -- Helpers ------------------------------------------------------------------

fn order_by_angle(mut corners: [Point; 4]) -> Quad {
    let (cx, cy) = centroid(&corners);
    let angle = |p: &Point| (f64::from(p.y) - cy).atan2(f64::from(p.x) - cx);
    // `sort_by` is stable: equal angles keep their input order.
    corners.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
    let [top_left, top_right, bottom_right, bottom_left] = corners;
    Quad::new(top_left, top_right, bottom_right, bottom_left)
}

fn centroid(points: &[Point; 4]) -> (f64, f64) {
    let sum_x: f64 = points.iter().map(|p| f64::from(p.x)).sum();
    let sum_y: f64 = points.iter().map(|p| f64::from(p.y)).sum();
    (sum_x / 4.0, sum_y / 4.0)
}

/// Absolute area of a simple polygon given in boundary order (shoelace).
pub fn polygon_area(corners: &[Point]) -> f64 {
    let n = corners.len();
    let mut twice_area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += f64::from(corners[i].x) * f64::from(corners[j].y);
        twice_area -= f64::from(corners[j].x) * f64::from(corners[i].y);
    }
    twice_area.abs() / 2.0
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Quad {
        Quad::new(
            Point::new(10, 10),
            Point::new(90, 10),
            Point::new(90, 90),
            Point::new(10, 90),
        )
    }

    fn sorted(mut points: Vec<Point>) -> Vec<Point> {
        points.sort_by_key(|p| (p.x, p.y));
        points
    }

    #[test]
    fn build_quad_requires_exactly_four_vertices() {
        let p = Point::new(1, 1);
        assert!(build_quad(&[]).is_none());
        assert!(build_quad(&[p, p, p]).is_none());
        assert!(build_quad(&[p, p, p, p, p]).is_none());
    }

    #[test]
    fn build_quad_orders_shuffled_square_clockwise() {
        let q = square();
        let shuffled = [q.bottom_right, q.top_left, q.bottom_left, q.top_right];
        let built = build_quad(&shuffled).expect("four vertices");
        assert_eq!(built, q);
    }

    #[test]
    fn build_quad_keeps_every_vertex() {
        let inputs = [
            vec![
                Point::new(3, 7),
                Point::new(120, 15),
                Point::new(100, 140),
                Point::new(-5, 90),
            ],
            vec![
                Point::new(0, 0),
                Point::new(0, 0),
                Point::new(10, 10),
                Point::new(20, 0),
            ],
            vec![
                Point::new(5, 5),
                Point::new(10, 10),
                Point::new(15, 15),
                Point::new(20, 20),
            ],
        ];

        for input in inputs {
            let built = build_quad(&input).expect("four vertices");
            assert_eq!(sorted(built.points().to_vec()), sorted(input.clone()));
            // Re-sorting an ordered quad is a fixed point.
            assert_eq!(built.canonicalized(), built);
        }
    }

    #[test]
    fn build_quad_perspective_quad() {
        // A trapezoid seen from below: narrow top, wide bottom.
        let built = build_quad(&[
            Point::new(20, 200),
            Point::new(70, 30),
            Point::new(180, 200),
            Point::new(130, 30),
        ])
        .expect("four vertices");
        assert_eq!(built.top_left, Point::new(70, 30));
        assert_eq!(built.top_right, Point::new(130, 30));
        assert_eq!(built.bottom_right, Point::new(180, 200));
        assert_eq!(built.bottom_left, Point::new(20, 200));
    }

    #[test]
    fn diamond_labels_start_at_topmost_vertex() {
        // Known approximation: at 45° the "top-left" label lands on the
        // topmost vertex rather than a semantic corner.
        let built = build_quad(&[
            Point::new(10, 50),
            Point::new(50, 90),
            Point::new(90, 50),
            Point::new(50, 10),
        ])
        .expect("four vertices");
        assert_eq!(built.top_left, Point::new(50, 10));
        assert_eq!(built.top_right, Point::new(90, 50));
        assert_eq!(built.bottom_right, Point::new(50, 90));
        assert_eq!(built.bottom_left, Point::new(10, 50));
    }

    #[test]
    fn scale_quad_round_trip_within_one_pixel() {
        let q = Quad::new(
            Point::new(37, 12),
            Point::new(201, 19),
            Point::new(233, 250),
            Point::new(5, 241),
        );
        let up = scale_quad(&q, 256, 256, 1080, 1440);
        let back = scale_quad(&up, 1080, 1440, 256, 256);
        for (a, b) in q.points().iter().zip(back.points().iter()) {
            assert!((a.x - b.x).abs() <= 1, "x drifted: {a:?} vs {b:?}");
            assert!((a.y - b.y).abs() <= 1, "y drifted: {a:?} vs {b:?}");
        }
    }

    #[test]
    fn scale_quad_truncates_after_scaling() {
        let q = Quad::new(
            Point::new(1, 1),
            Point::new(3, 1),
            Point::new(3, 3),
            Point::new(1, 3),
        );
        // 1 * 1.5 = 1.5 -> 1, 3 * 1.5 = 4.5 -> 4
        let scaled = scale_quad(&q, 10, 10, 15, 15);
        assert_eq!(scaled.top_left, Point::new(1, 1));
        assert_eq!(scaled.bottom_right, Point::new(4, 4));
    }

    #[test]
    fn scale_quad_zero_source_is_identity() {
        let q = square();
        assert_eq!(scale_quad(&q, 0, 100, 200, 200), q);
    }

    #[test]
    fn rotate_full_turn_is_identity() {
        let q = Quad::new(
            Point::new(3, 8),
            Point::new(77, 2),
            Point::new(70, 61),
            Point::new(1, 55),
        );
        for (w, h) in [(100, 100), (80, 60), (33, 91)] {
            assert_eq!(rotate_quad(&q, 4, w, h), q);
            assert_eq!(rotate_quad(&q, -4, w, h), q);
            assert_eq!(rotate_quad(&q, 0, w, h), q);
        }
    }

    #[test]
    fn rotate_then_complement_recovers_quad() {
        let q = Quad::new(
            Point::new(3, 8),
            Point::new(77, 2),
            Point::new(70, 61),
            Point::new(1, 55),
        );
        for (w, h) in [(100, 100), (80, 60), (33, 91), (31, 31)] {
            for k in 0..4 {
                let back = rotate_quad(&rotate_quad(&q, k, w, h), 4 - k, w, h);
                for (a, b) in q.points().iter().zip(back.points().iter()) {
                    assert!(
                        (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1,
                        "k={k} {w}x{h}: {a:?} vs {b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        let turned = rotate_quad(&square(), 1, 100, 100);
        // Top-left corner moves to where top-right was.
        assert_eq!(turned.top_left, Point::new(90, 10));
        assert_eq!(turned.top_right, Point::new(90, 90));
        assert_eq!(turned.canonicalized(), square());
    }

    #[test]
    fn negative_turns_rotate_counterclockwise() {
        let q = square();
        assert_eq!(rotate_quad(&q, -1, 100, 100), rotate_quad(&q, 3, 100, 100));
        assert_eq!(rotate_quad(&q, -1, 100, 100).top_left, Point::new(10, 90));
    }

    #[test]
    fn area_and_edges_of_square() {
        let q = square();
        assert!((q.area() - 6400.0).abs() < 1e-9);
        assert_eq!(q.edge_lengths(), [80.0, 80.0, 80.0, 80.0]);
        assert_eq!(q.centroid(), (50.0, 50.0));
        assert!(!q.is_degenerate());
    }

    #[test]
    fn lines_form_a_closed_loop() {
        let lines = square().lines();
        for i in 0..4 {
            assert_eq!(lines[i].to, lines[(i + 1) % 4].from);
        }
    }

    #[test]
    fn collinear_quad_is_degenerate() {
        let q = build_quad(&[
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(20, 20),
            Point::new(30, 30),
        ])
        .expect("four vertices");
        assert!(q.is_degenerate());
    }

    #[test]
    fn border_sliver_is_degenerate() {
        // Three corners on x = 59: what a page touching the frame corner
        // leaves after edge detection.
        let sliver = Quad::new(
            Point::new(59, 1),
            Point::new(59, 58),
            Point::new(59, 59),
            Point::new(1, 60),
        );
        assert!(sliver.area() > 1000.0);
        assert!(sliver.is_degenerate());
    }

    #[test]
    fn concave_quad_is_degenerate() {
        let dart = Quad::new(
            Point::new(0, 0),
            Point::new(50, 40),
            Point::new(100, 0),
            Point::new(50, 100),
        );
        assert!(dart.is_degenerate());
    }

    #[test]
    fn perspective_quads_are_not_degenerate() {
        assert!(!square().is_degenerate());
        let skewed = Quad::new(
            Point::new(60, 30),
            Point::new(150, 40),
            Point::new(175, 170),
            Point::new(25, 160),
        );
        assert!(!skewed.is_degenerate());
    }
}
