// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-flight admission for live preview analysis.
//
// At most one live inference runs at a time. Frames that arrive while one is
// in flight are dropped, not queued, so the next admitted frame is always the
// newest. A capture pauses the lane for its duration. Closing the lane when
// the session ends rejects all further frames and bumps the generation, so
// results from inferences started earlier are thrown away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, trace};

/// Why a frame was not admitted to the live lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneRejection {
    /// Another live inference is in flight.
    Busy,
    /// A capture is in progress.
    Paused,
    /// The lane was closed.
    Closed,
}

#[derive(Debug, Default)]
pub struct LiveLane {
    in_flight: AtomicBool,
    closed: AtomicBool,
    pause_depth: AtomicUsize,
    generation: AtomicU64,
}

impl LiveLane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Admit one live inference. The lane stays busy until the returned
    /// permit is dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Result<LanePermit, LaneRejection> {
        if self.is_closed() {
            trace!("Live lane closed; dropping frame");
            return Err(LaneRejection::Closed);
        }
        if self.is_paused() {
            trace!("Live lane paused; dropping frame");
            return Err(LaneRejection::Paused);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Live lane busy; dropping frame");
            return Err(LaneRejection::Busy);
        }
        let permit = LanePermit {
            lane: Arc::clone(self),
            generation: self.generation(),
        };
        // A close racing with admission: dropping the permit frees the lane.
        if self.is_closed() {
            return Err(LaneRejection::Closed);
        }
        Ok(permit)
    }

    /// Pause admission until the returned guard is dropped. Pauses nest.
    pub fn pause(self: &Arc<Self>) -> PauseGuard {
        let depth = self.pause_depth.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(depth, "Live lane paused");
        PauseGuard {
            lane: Arc::clone(self),
        }
    }

    /// Close the lane for good: every permit issued so far becomes stale and
    /// no new ones are granted. Returns the new generation.
    pub fn close(&self) -> u64 {
        self.closed.store(true, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "Live lane closed");
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth.load(Ordering::Acquire) > 0
    }
}

/// Proof of admission to the live lane. Releases the lane on drop.
#[derive(Debug)]
pub struct LanePermit {
    lane: Arc<LiveLane>,
    generation: u64,
}

impl LanePermit {
    /// Whether results produced under this permit may still be published.
    pub fn is_current(&self) -> bool {
        self.lane.generation() == self.generation
    }
}

impl Drop for LanePermit {
    fn drop(&mut self) {
        self.lane.in_flight.store(false, Ordering::Release);
    }
}

/// Keeps the live lane paused while alive.
#[derive(Debug)]
pub struct PauseGuard {
    lane: Arc<LiveLane>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        let depth = self.lane.pause_depth.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(depth, "Live lane pause released");
    }
}
