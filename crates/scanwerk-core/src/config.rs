// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration. Defaults are tuned for binary segmentation masks,
// not arbitrary photographs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Tuning for the mask-to-quad detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Gaussian blur kernel size (odd, in pixels).
    pub blur_kernel: u32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Polygon simplification tolerance as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 75.0,
            canny_high: 200.0,
            approx_epsilon_ratio: 0.02,
        }
    }
}

impl DetectorConfig {
    /// Gaussian sigma equivalent to a `blur_kernel`-sized kernel, using the
    /// usual `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule.
    pub fn blur_sigma(&self) -> f32 {
        0.3 * ((self.blur_kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

/// Output settings for perspective rectification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    /// RGBA colour for output pixels that map outside the source image.
    pub fill: [u8; 4],
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            fill: [255, 255, 255, 255],
        }
    }
}

/// Capture-time reuse of the last good live detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// How old the last good fix may be and still be reused, in milliseconds.
    pub staleness_window_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: 1500,
        }
    }
}

/// Segmentation model location and input normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Path to the `.rten` segmentation model.
    pub model_path: PathBuf,
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    /// Per-channel (RGB) mean subtracted after scaling to `[0, 1]`.
    pub mean: [f32; 3],
    /// Per-channel (RGB) standard deviation divided after mean subtraction.
    pub std: [f32; 3],
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("document-segmentation.rten"),
            input_width: 256,
            input_height: 256,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Complete scanner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub detector: DetectorConfig,
    pub rectifier: RectifierConfig,
    pub fallback: FallbackConfig,
    pub segmentation: SegmentationConfig,
}

impl ScannerConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let detector = &self.detector;
        if detector.blur_kernel == 0 || detector.blur_kernel % 2 == 0 {
            return Err(ScanwerkError::InvalidConfig(format!(
                "blur_kernel must be a positive odd number, got {}",
                detector.blur_kernel
            )));
        }
        if detector.canny_low > detector.canny_high {
            return Err(ScanwerkError::InvalidConfig(format!(
                "canny_low ({}) exceeds canny_high ({})",
                detector.canny_low, detector.canny_high
            )));
        }
        if detector.approx_epsilon_ratio <= 0.0 || !detector.approx_epsilon_ratio.is_finite() {
            return Err(ScanwerkError::InvalidConfig(format!(
                "approx_epsilon_ratio must be positive, got {}",
                detector.approx_epsilon_ratio
            )));
        }
        let seg = &self.segmentation;
        if seg.input_width == 0 || seg.input_height == 0 {
            return Err(ScanwerkError::InvalidConfig(
                "segmentation input dimensions must be non-zero".into(),
            ));
        }
        if seg.std.iter().any(|s| *s <= 0.0) {
            return Err(ScanwerkError::InvalidConfig(
                "segmentation std values must be positive".into(),
            ));
        }
        Ok(())
    }
}
