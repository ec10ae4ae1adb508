// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document segmentation backed by an `rten` model.
//
// # Feature Gate
//
// Only available with the `segmentation` feature:
//
// ```toml
// scanwerk-vision = { path = "crates/scanwerk-vision", features = ["segmentation"] }
// ```
//
// # Model contract
//
// The model takes one `[1, 3, H, W]` float input (normalised RGB) and returns
// one `[1, C, h, w]` tensor of per-class scores. Class 0 is background; the
// mask is the per-pixel argmax.

use std::time::Instant;

use image::DynamicImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use scanwerk_core::config::SegmentationConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{Mask, Rotation};
use tracing::{debug, info, instrument};

use super::{SegmentationEngine, to_nchw_input};

/// Segmentation engine running a `.rten` model on the CPU.
///
/// Model loading is the expensive step. Build one engine per scan session
/// and reuse it for every frame.
pub struct RtenSegmenter {
    model: Model,
    config: SegmentationConfig,
    output_size: (u32, u32),
}

impl RtenSegmenter {
    /// Load the model named by `config.model_path`.
    ///
    /// `output_size` is the fixed `(width, height)` of the model's output
    /// tensor.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::ModelLoad`] if the file is missing or corrupt.
    #[instrument(skip_all, fields(model = %config.model_path.display()))]
    pub fn new(config: SegmentationConfig, output_size: (u32, u32)) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(ScanwerkError::ModelLoad(format!(
                "segmentation model not found at {}",
                config.model_path.display()
            )));
        }

        info!("Loading segmentation model");
        let model = Model::load_file(&config.model_path).map_err(|err| {
            ScanwerkError::ModelLoad(format!(
                "failed to load segmentation model from {}: {}",
                config.model_path.display(),
                err
            ))
        })?;

        info!(
            input_w = config.input_width,
            input_h = config.input_height,
            output_w = output_size.0,
            output_h = output_size.1,
            "Segmentation model loaded"
        );
        Ok(Self {
            model,
            config,
            output_size,
        })
    }
}

impl SegmentationEngine for RtenSegmenter {
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), rotation = rotation.degrees()))]
    fn infer(&self, image: &DynamicImage, rotation: Rotation) -> Result<Mask> {
        let started = Instant::now();
        let data = to_nchw_input(image, rotation, &self.config);
        let input = NdTensor::from_data(
            [
                1,
                3,
                self.config.input_height as usize,
                self.config.input_width as usize,
            ],
            data,
        );

        let output: NdTensor<f32, 4> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| ScanwerkError::Inference(format!("model run failed: {}", err)))?
            .try_into()
            .map_err(|err| {
                ScanwerkError::Inference(format!("unexpected model output type: {:?}", err))
            })?;

        let [_, classes, out_h, out_w] = output.shape();
        let logits = output.to_vec();
        let mask = Mask::from_logits(out_w as u32, out_h as u32, classes, &logits)?;

        debug!(
            classes,
            out_w,
            out_h,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Segmentation inference complete"
        );
        Ok(mask)
    }

    fn output_size(&self) -> (u32, u32) {
        self.output_size
    }
}
