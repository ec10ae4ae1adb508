// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-vision: image-space stages of the Scanwerk pipeline.
//
// Provides the mask-to-quad detector (blur, Canny, contours, polygon
// simplification), the four-point perspective rectifier, and the segmentation
// engine seam with an optional `rten` backend.

pub mod detector;
pub mod rectify;
pub mod segmentation;

// Re-export the primary structs so callers can use `scanwerk_vision::QuadDetector` etc.
pub use detector::QuadDetector;
pub use rectify::{PerspectiveRectifier, rectified_size};
pub use segmentation::SegmentationEngine;

#[cfg(feature = "segmentation")]
pub use segmentation::RtenSegmenter;
