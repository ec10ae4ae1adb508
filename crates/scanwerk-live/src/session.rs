// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session: the live preview lane and the capture flow sharing one
// segmentation engine.
//
// Live flow:
//   1. Admit the frame to the single-flight lane (drop it if busy, paused
//      or ended)
//   2. Segment -> detect in mask space
//   3. Drop the result if the session ended meanwhile
//   4. Publish the snapshot and record the fix if a quad was found
//
// Capture flow:
//   1. Pause the live lane
//   2. Segment the capture frame -> detect, scaled to the upright capture
//   3. If no usable quad was found, fall back on a fresh last good fix
//   4. Rectify the upright capture through the chosen quad

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{DetectionResult, Frame, LiveAnalysisState, Quad, ScannerConfig};
use scanwerk_vision::{PerspectiveRectifier, QuadDetector, SegmentationEngine};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::lane::{LanePermit, LaneRejection, LiveLane, PauseGuard};
use crate::tracking::{FallbackPolicy, Fix, LastGoodFix};

/// Result of offering a preview frame to the live lane.
#[derive(Debug)]
pub enum LiveOutcome {
    /// Inference ran and the snapshot was published.
    Analyzed(Arc<LiveAnalysisState>),
    /// Another live inference was in flight; the frame was dropped.
    Busy,
    /// A capture was in progress; the frame was dropped.
    Paused,
    /// The session has ended; the frame was dropped.
    Closed,
    /// The session ended while inference ran; the result was thrown away.
    Discarded,
    /// Inference failed. The last good fix is kept.
    Failed(ScanwerkError),
}

impl From<LaneRejection> for LiveOutcome {
    fn from(rejection: LaneRejection) -> Self {
        match rejection {
            LaneRejection::Busy => Self::Busy,
            LaneRejection::Paused => Self::Paused,
            LaneRejection::Closed => Self::Closed,
        }
    }
}

/// Where a capture's quad came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadSource {
    /// Detected on the capture frame itself.
    Detected,
    /// Reused from a recent live detection.
    LastGoodFix,
    /// No usable quad.
    Unavailable,
}

/// Result of a capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Document quad in upright capture coordinates.
    pub quad: Option<Quad>,
    pub source: QuadSource,
    /// The rectified page, when the quad could be warped.
    pub page: Option<DynamicImage>,
}

/// One scanning session. Share it behind an `Arc` between the camera
/// callback and the shutter handler.
pub struct ScanSession<E> {
    id: Uuid,
    engine: E,
    detector: QuadDetector,
    rectifier: PerspectiveRectifier,
    fallback: FallbackPolicy,
    lane: Arc<LiveLane>,
    last_fix: LastGoodFix,
    latest: Mutex<Option<Arc<LiveAnalysisState>>>,
}

impl<E: SegmentationEngine> ScanSession<E> {
    /// Start a session around `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::InvalidConfig`] if `config` fails validation.
    pub fn new(engine: E, config: &ScannerConfig) -> Result<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        info!(session = %id, "Scan session started");
        Ok(Self {
            id,
            engine,
            detector: QuadDetector::new(config.detector.clone()),
            rectifier: PerspectiveRectifier::new(config.rectifier.clone()),
            fallback: FallbackPolicy::new(&config.fallback),
            lane: LiveLane::new(),
            last_fix: LastGoodFix::new(),
            latest: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn lane(&self) -> &Arc<LiveLane> {
        &self.lane
    }

    pub fn tracking(&self) -> &LastGoodFix {
        &self.last_fix
    }

    /// Most recently published live snapshot.
    pub fn latest_state(&self) -> Option<Arc<LiveAnalysisState>> {
        self.latest.lock().map(|latest| latest.clone()).unwrap_or(None)
    }

    pub fn last_good_fix(&self) -> Option<Fix> {
        self.last_fix.snapshot()
    }

    /// Analyse a preview frame on the calling thread, if the lane admits it.
    pub fn analyze_live_frame(&self, frame: &Frame, now: DateTime<Utc>) -> LiveOutcome {
        match self.lane.try_acquire() {
            Ok(permit) => self.run_live(permit, frame, now),
            Err(rejection) => rejection.into(),
        }
    }

    #[instrument(skip_all, fields(session = %self.id, rotation = frame.rotation.degrees()))]
    fn run_live(&self, permit: LanePermit, frame: &Frame, now: DateTime<Utc>) -> LiveOutcome {
        let started = Instant::now();
        let mask = match self.engine.segment(&frame.image, frame.rotation) {
            Ok(mask) => mask,
            Err(err) => {
                warn!(error = %err, "Live inference failed");
                return LiveOutcome::Failed(err);
            }
        };
        let inference_duration = started.elapsed();
        let detection = self.detector.detect(&mask);

        // `end` takes the same lock, so the generation cannot change between
        // this check and the writes below.
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if !permit.is_current() {
            debug!("Session ended during live inference; discarding result");
            return LiveOutcome::Discarded;
        }

        let state = Arc::new(LiveAnalysisState {
            inference_duration,
            mask,
            detection,
            rotation: frame.rotation,
            timestamp: now,
        });
        if self.last_fix.observe(&state) {
            debug!(quad = ?state.quad(), "Last good fix updated");
        }
        *latest = Some(Arc::clone(&state));
        drop(latest);
        debug!(
            inference_ms = inference_duration.as_millis() as u64,
            detected = state.detection.is_detected(),
            "Live frame analysed"
        );
        LiveOutcome::Analyzed(state)
    }

    /// Capture a still frame: detect its document, or fall back on a fresh
    /// last good fix, then rectify. The live lane is paused meanwhile.
    pub fn capture(&self, frame: &Frame, now: DateTime<Utc>) -> CaptureOutcome {
        let _pause = self.lane.pause();
        self.run_capture(frame, now)
    }

    #[instrument(skip_all, fields(session = %self.id, width = frame.width(), height = frame.height()))]
    fn run_capture(&self, frame: &Frame, now: DateTime<Utc>) -> CaptureOutcome {
        let upright = frame.upright();
        let (width, height) = (upright.width(), upright.height());

        let detection = match self.engine.segment(&frame.image, frame.rotation) {
            Ok(mask) => self.detector.detect_scaled(&mask, width, height),
            Err(err) => {
                warn!(error = %err, "Capture inference failed");
                DetectionResult::NotDetected
            }
        };

        let (quad, source) = match detection {
            DetectionResult::Detected(quad) if !quad.is_degenerate() => {
                (Some(quad), QuadSource::Detected)
            }
            _ => {
                let fix = self.last_fix.snapshot();
                match self
                    .fallback
                    .resolve(fix.as_ref(), now, frame.rotation, width, height)
                {
                    Some(quad) => (Some(quad), QuadSource::LastGoodFix),
                    None => (None, QuadSource::Unavailable),
                }
            }
        };

        let page = quad.and_then(|quad| match self.rectifier.rectify(&upright, &quad) {
            Ok(page) => Some(page),
            Err(err) => {
                warn!(error = %err, "Capture quad could not be rectified");
                None
            }
        });

        info!(
            ?source,
            rectified = page.is_some(),
            "Capture processed"
        );
        CaptureOutcome { quad, source, page }
    }

    /// End the session. Live results still in flight are discarded and
    /// further preview frames are rejected with [`LiveOutcome::Closed`].
    pub fn end(&self) {
        let _publish = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.lane.close();
        info!(session = %self.id, generation, "Scan session ended");
    }

    pub fn is_ended(&self) -> bool {
        self.lane.is_closed()
    }
}

impl<E: SegmentationEngine + 'static> ScanSession<E> {
    /// Offer a preview frame to the live lane and run it on tokio's blocking
    /// pool. Admission is decided before spawning, so a rejected frame costs
    /// nothing. Must be called from within a tokio runtime.
    pub fn spawn_live_analysis(
        self: &Arc<Self>,
        frame: Frame,
        now: DateTime<Utc>,
    ) -> std::result::Result<JoinHandle<LiveOutcome>, LaneRejection> {
        let permit = self.lane.try_acquire()?;
        let session = Arc::clone(self);
        Ok(tokio::task::spawn_blocking(move || {
            session.run_live(permit, &frame, now)
        }))
    }

    /// [`capture`](Self::capture) on tokio's blocking pool. The live lane is
    /// paused as soon as this is called.
    pub fn spawn_capture(self: &Arc<Self>, frame: Frame, now: DateTime<Utc>) -> JoinHandle<CaptureOutcome> {
        let pause: PauseGuard = self.lane.pause();
        let session = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let outcome = session.run_capture(&frame, now);
            drop(pause);
            outcome
        })
    }
}

// -- Tests --------------------------------------------------------------------
