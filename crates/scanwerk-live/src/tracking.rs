// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Last-good-fix tracking and the capture-time fallback policy.
//
// The live lane records every successful detection here. When detection at
// capture time comes back empty (typically because the shutter fired between
// two live results), the capture flow may reuse the most recent fix if it is
// fresh enough.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use scanwerk_core::config::FallbackConfig;
use scanwerk_core::geometry::{rotate_quad, scale_quad};
use scanwerk_core::{LiveAnalysisState, Quad, Rotation};
use tracing::{debug, info};

/// A successful live detection, kept for capture-time reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fix {
    /// Detected quad, in mask coordinates.
    pub quad: Quad,
    pub mask_width: u32,
    pub mask_height: u32,
    /// Rotation of the preview frame the quad was detected in.
    pub rotation: Rotation,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// The fix carried by a live-analysis snapshot, if it detected a quad.
    pub fn from_state(state: &LiveAnalysisState) -> Option<Self> {
        let (mask_width, mask_height) = state.mask.dimensions();
        state.quad().map(|quad| Self {
            quad: *quad,
            mask_width,
            mask_height,
            rotation: state.rotation,
            timestamp: state.timestamp,
        })
    }
}

/// Tracking state of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// No quad has been observed yet.
    NoFix,
    /// The most recent successful detection.
    HasFix(Fix),
}

/// Single shared slot holding the last good fix.
///
/// Written by the live lane, read by the capture flow. Writes replace the
/// whole fix; readers get a copy, never a half-updated value. Cloning shares
/// the same slot.
#[derive(Debug, Clone, Default)]
pub struct LastGoodFix {
    slot: Arc<Mutex<Option<Fix>>>,
}

impl LastGoodFix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with `fix`. Degenerate quads are refused and leave
    /// the previous fix in place. Returns whether the slot was updated.
    pub fn record(&self, fix: Fix) -> bool {
        if fix.quad.is_degenerate() {
            debug!(quad = ?fix.quad, "Refusing to record degenerate quad as last good fix");
            return false;
        }
        match self.slot.lock() {
            Ok(mut slot) => {
                *slot = Some(fix);
                true
            }
            Err(_) => false,
        }
    }

    /// Record the fix carried by `state`. Snapshots without a usable quad
    /// leave the slot untouched. Returns whether the slot was updated.
    pub fn observe(&self, state: &LiveAnalysisState) -> bool {
        Fix::from_state(state).is_some_and(|fix| self.record(fix))
    }

    /// Copy of the current fix.
    pub fn snapshot(&self) -> Option<Fix> {
        self.slot.lock().map(|slot| *slot).unwrap_or(None)
    }

    pub fn state(&self) -> TrackingState {
        match self.snapshot() {
            Some(fix) => TrackingState::HasFix(fix),
            None => TrackingState::NoFix,
        }
    }
}

/// Decides whether, and how, a last good fix stands in for a failed capture
/// detection.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    window: TimeDelta,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(&FallbackConfig::default())
    }
}

impl FallbackPolicy {
    pub fn new(config: &FallbackConfig) -> Self {
        let window_ms = i64::try_from(config.staleness_window_ms).unwrap_or(i64::MAX);
        Self {
            window: TimeDelta::try_milliseconds(window_ms).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Whether `fix` is within the staleness window of `now`. The window is
    /// inclusive and symmetric, so a fix stamped slightly ahead of a
    /// caller-supplied `now` still counts.
    pub fn is_fresh(&self, fix: &Fix, now: DateTime<Utc>) -> bool {
        (now - fix.timestamp).abs() <= self.window
    }

    /// Quarter turns to apply to a quad detected at `live` so it lines up
    /// with a capture taken at `capture`.
    pub fn quarter_turns(live: Rotation, capture: Rotation) -> i32 {
        live.quarter_turns() - capture.quarter_turns()
    }

    /// Map a fresh fix into a `capture_width x capture_height` capture image
    /// taken at `capture_rotation`.
    ///
    /// The quad is turned by the rotation difference around the mask centre,
    /// relabelled, then scaled from mask space to capture space. Returns
    /// `None` when there is no fix or it is stale.
    pub fn resolve(
        &self,
        fix: Option<&Fix>,
        now: DateTime<Utc>,
        capture_rotation: Rotation,
        capture_width: u32,
        capture_height: u32,
    ) -> Option<Quad> {
        let Some(fix) = fix else {
            debug!("No last good fix to fall back on");
            return None;
        };
        if !self.is_fresh(fix, now) {
            info!(
                age_ms = (now - fix.timestamp).num_milliseconds(),
                "Last good fix is stale; not reusing it"
            );
            return None;
        }

        let turns = Self::quarter_turns(fix.rotation, capture_rotation);
        let rotated = rotate_quad(&fix.quad, turns, fix.mask_width, fix.mask_height).canonicalized();
        let quad = scale_quad(
            &rotated,
            fix.mask_width,
            fix.mask_height,
            capture_width,
            capture_height,
        );
        info!(
            turns,
            age_ms = (now - fix.timestamp).num_milliseconds(),
            "Reusing last good fix for capture"
        );
        Some(quad)
    }
}

// -- Tests --------------------------------------------------------------------
