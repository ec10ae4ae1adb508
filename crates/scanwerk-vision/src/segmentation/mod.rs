// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation adapter: the seam between the scan pipeline and whatever
// neural network turns a camera frame into a document/background mask.
//
// The network itself is opaque. The pipeline only relies on the output
// contract: a per-pixel class map of the engine's fixed output size, class 0
// being background.

#[cfg(feature = "segmentation")]
pub mod rten_model;

#[cfg(feature = "segmentation")]
pub use rten_model::RtenSegmenter;

use image::DynamicImage;
use image::imageops::FilterType;
use scanwerk_core::config::SegmentationConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{Mask, Rotation};

/// A segmentation model producing document masks.
pub trait SegmentationEngine: Send + Sync {
    /// Segment `image`, which must be rotated by `rotation` to be upright.
    /// The returned mask is in upright orientation.
    fn infer(&self, image: &DynamicImage, rotation: Rotation) -> Result<Mask>;

    /// Fixed `(width, height)` of every mask this engine returns.
    fn output_size(&self) -> (u32, u32);

    /// [`infer`](Self::infer), rejecting masks that break the output contract.
    fn segment(&self, image: &DynamicImage, rotation: Rotation) -> Result<Mask> {
        let mask = self.infer(image, rotation)?;
        let expected = self.output_size();
        if mask.dimensions() != expected {
            return Err(ScanwerkError::Inference(format!(
                "engine returned a {}x{} mask, expected {}x{}",
                mask.width(),
                mask.height(),
                expected.0,
                expected.1
            )));
        }
        Ok(mask)
    }
}

/// Turn a frame into a normalised NCHW `f32` tensor buffer
/// (`[1, 3, input_height, input_width]`, RGB planes).
///
/// The frame is rotated upright, resized to the model input, scaled to
/// `[0, 1]`, then normalised with the configured per-channel mean and std.
pub fn to_nchw_input(image: &DynamicImage, rotation: Rotation, config: &SegmentationConfig) -> Vec<f32> {
    let (width, height) = (config.input_width, config.input_height);
    let upright = rotation.apply(image);
    let resized = upright.resize_exact(width, height, FilterType::Triangle).to_rgb8();

    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = f32::from(pixel.0[channel]) / 255.0;
            data[channel * plane + i] = (value - config.mean[channel]) / config.std[channel];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb, RgbImage};

    /// Engine that echoes a fixed mask and records nothing.
    struct FixedEngine {
        mask: Mask,
        size: (u32, u32),
    }

    impl SegmentationEngine for FixedEngine {
        fn infer(&self, _image: &DynamicImage, _rotation: Rotation) -> Result<Mask> {
            Ok(self.mask.clone())
        }

        fn output_size(&self) -> (u32, u32) {
            self.size
        }
    }

    #[test]
    fn segment_accepts_contract_sized_mask() {
        let engine = FixedEngine {
            mask: Mask::empty(64, 64),
            size: (64, 64),
        };
        let image = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(engine.segment(&image, Rotation::Deg0).is_ok());
    }

    #[test]
    fn segment_rejects_wrong_sized_mask() {
        let engine = FixedEngine {
            mask: Mask::empty(32, 64),
            size: (64, 64),
        };
        let image = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        let err = engine.segment(&image, Rotation::Deg0).unwrap_err();
        assert!(matches!(err, ScanwerkError::Inference(_)));
    }

    #[test]
    fn nchw_input_layout_and_normalisation() {
        let config = SegmentationConfig {
            input_width: 4,
            input_height: 2,
            mean: [0.0, 0.0, 0.0],
            std: [1.0, 1.0, 1.0],
            ..SegmentationConfig::default()
        };
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([255, 0, 51])));
        let data = to_nchw_input(&image, Rotation::Deg0, &config);

        assert_eq!(data.len(), 3 * 4 * 2);
        assert!(data[..8].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(data[8..16].iter().all(|v| v.abs() < 1e-6));
        assert!(data[16..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn nchw_input_rotates_before_resizing() {
        let config = SegmentationConfig {
            input_width: 2,
            input_height: 2,
            mean: [0.0, 0.0, 0.0],
            std: [1.0, 1.0, 1.0],
            ..SegmentationConfig::default()
        };
        // Left column white, right column black; a quarter turn puts white on top.
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(0, 1, Rgb([255, 255, 255]));
        let data = to_nchw_input(&DynamicImage::ImageRgb8(img), Rotation::Deg90, &config);

        // Red plane, row-major: top row white, bottom row black.
        assert_eq!(&data[..4], &[1.0, 1.0, 0.0, 0.0]);
    }
}
