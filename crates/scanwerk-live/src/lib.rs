// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-live: the concurrent half of Scanwerk.
//
// A live preview lane runs segmentation and quad detection on camera frames
// one at a time, remembering the last good fix. The capture flow detects on
// the still frame, falls back on that fix when detection misses, and
// rectifies the page.

pub mod lane;
pub mod logging;
pub mod session;
pub mod tracking;

pub use lane::{LanePermit, LaneRejection, LiveLane, PauseGuard};
pub use session::{CaptureOutcome, LiveOutcome, QuadSource, ScanSession};
pub use tracking::{FallbackPolicy, Fix, LastGoodFix, TrackingState};
