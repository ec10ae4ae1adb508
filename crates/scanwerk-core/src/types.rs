// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk pipeline: camera frames, segmentation
// masks, detection outcomes, and live-analysis snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};
use crate::geometry::Quad;

/// Pixel value used for document pixels in a [`Mask`].
pub const DOCUMENT: u8 = 255;
/// Pixel value used for background pixels in a [`Mask`].
pub const BACKGROUND: u8 = 0;

/// Clockwise rotation needed to bring a camera frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse camera rotation metadata. Any multiple of 90 is accepted,
    /// including negative values and full turns.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(ScanwerkError::InvalidRotation(degrees));
        }
        Ok(Self::from_quarter_turns(degrees / 90))
    }

    /// Build from a (possibly negative) number of clockwise quarter turns.
    pub fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() * 90
    }

    pub fn quarter_turns(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 1,
            Self::Deg180 => 2,
            Self::Deg270 => 3,
        }
    }

    /// Whether applying this rotation swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Dimensions of a `width x height` image after this rotation.
    pub fn rotated_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Rotate `image` clockwise by this amount (lossless).
    pub fn apply(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::Deg0 => image.clone(),
            Self::Deg90 => image.rotate90(),
            Self::Deg180 => image.rotate180(),
            Self::Deg270 => image.rotate270(),
        }
    }
}

/// A raw preview or capture frame with its rotation metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub rotation: Rotation,
}

impl Frame {
    pub fn new(image: DynamicImage, rotation: Rotation) -> Self {
        Self { image, rotation }
    }

    /// Wrap a tightly packed RGBA8 pixel buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>, rotation_degrees: i32) -> Result<Self> {
        let rotation = Rotation::from_degrees(rotation_degrees)?;
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        let buffer = RgbaImage::from_raw(width, height, pixels)
            .ok_or(ScanwerkError::DimensionMismatch { expected, actual })?;
        Ok(Self::new(DynamicImage::ImageRgba8(buffer), rotation))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The frame rotated so that the document appears upright.
    pub fn upright(&self) -> DynamicImage {
        self.rotation.apply(&self.image)
    }

    /// Dimensions of [`upright`](Self::upright) without rotating any pixels.
    pub fn upright_dimensions(&self) -> (u32, u32) {
        self.rotation.rotated_dimensions(self.width(), self.height())
    }
}

/// Binary document/background segmentation, one byte per pixel.
///
/// Pixels are either [`DOCUMENT`] or [`BACKGROUND`]; every constructor
/// collapses its input to those two values.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// An all-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Collapse a grey image: any non-zero pixel becomes document.
    pub fn from_gray(mut gray: GrayImage) -> Self {
        for pixel in gray.pixels_mut() {
            if pixel.0[0] != BACKGROUND {
                *pixel = Luma([DOCUMENT]);
            }
        }
        Self { image: gray }
    }

    /// Build from per-pixel class indices in row-major order. Class 0 is
    /// background; every other class is document.
    pub fn from_class_indices(width: u32, height: u32, classes: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if classes.len() != expected {
            return Err(ScanwerkError::DimensionMismatch {
                expected,
                actual: classes.len(),
            });
        }
        let data = classes
            .iter()
            .map(|&class| if class == 0 { BACKGROUND } else { DOCUMENT })
            .collect();
        let image = GrayImage::from_raw(width, height, data).ok_or(
            ScanwerkError::DimensionMismatch {
                expected,
                actual: classes.len(),
            },
        )?;
        Ok(Self { image })
    }

    /// Collapse raw class scores laid out as `[classes, height, width]` via a
    /// per-pixel argmax. Ties resolve to the lowest class index.
    pub fn from_logits(width: u32, height: u32, classes: usize, logits: &[f32]) -> Result<Self> {
        let plane = width as usize * height as usize;
        let expected = plane * classes;
        if classes == 0 || logits.len() != expected {
            return Err(ScanwerkError::DimensionMismatch {
                expected,
                actual: logits.len(),
            });
        }

        let indices: Vec<u8> = (0..plane)
            .map(|i| {
                let mut best_class = 0usize;
                let mut best_score = logits[i];
                for class in 1..classes {
                    let score = logits[class * plane + i];
                    if score > best_score {
                        best_score = score;
                        best_class = class;
                    }
                }
                u8::from(best_class != 0)
            })
            .collect();

        Self::from_class_indices(width, height, &indices)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether `(x, y)` is a document pixel. Out-of-range coordinates are
    /// background.
    pub fn is_document(&self, x: u32, y: u32) -> bool {
        self.image
            .get_pixel_checked(x, y)
            .is_some_and(|pixel| pixel.0[0] == DOCUMENT)
    }

    /// Number of document pixels.
    pub fn document_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] == DOCUMENT).count()
    }

    /// Share of pixels classified as document, in `[0, 1]`.
    pub fn document_fraction(&self) -> f64 {
        let total = self.image.width() as usize * self.image.height() as usize;
        if total == 0 {
            return 0.0;
        }
        self.document_pixels() as f64 / total as f64
    }

    /// True when no pixel is classified as document.
    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p.0[0] == BACKGROUND)
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_gray(self) -> GrayImage {
        self.image
    }

    /// The mask as a pure black/white image.
    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.image.clone())
    }
}

/// Outcome of running the quad detector on one mask.
///
/// Failing to find a document is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionResult {
    Detected(Quad),
    #[default]
    NotDetected,
}

impl DetectionResult {
    pub fn quad(&self) -> Option<&Quad> {
        match self {
            Self::Detected(quad) => Some(quad),
            Self::NotDetected => None,
        }
    }

    pub fn into_quad(self) -> Option<Quad> {
        match self {
            Self::Detected(quad) => Some(quad),
            Self::NotDetected => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

impl From<Option<Quad>> for DetectionResult {
    fn from(quad: Option<Quad>) -> Self {
        quad.map_or(Self::NotDetected, Self::Detected)
    }
}

/// Snapshot of one live-analysis pass. Replaced wholesale by the next pass.
#[derive(Debug, Clone)]
pub struct LiveAnalysisState {
    /// Time spent in segmentation inference.
    pub inference_duration: Duration,
    /// The binary mask the detector ran on.
    pub mask: Mask,
    /// Detector outcome, in mask coordinates.
    pub detection: DetectionResult,
    /// Rotation of the preview frame the mask was computed from.
    pub rotation: Rotation,
    /// Wall-clock time the sample was taken.
    pub timestamp: DateTime<Utc>,
}

impl LiveAnalysisState {
    pub fn quad(&self) -> Option<&Quad> {
        self.detection.quad()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(270).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Deg90);
        assert!(matches!(
            Rotation::from_degrees(45),
            Err(ScanwerkError::InvalidRotation(45))
        ));
    }

    #[test]
    fn rotation_dimensions_and_apply() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(40, 30));
        assert_eq!(Rotation::Deg90.rotated_dimensions(40, 30), (30, 40));
        assert_eq!(Rotation::Deg180.rotated_dimensions(40, 30), (40, 30));
        let turned = Rotation::Deg270.apply(&img);
        assert_eq!((turned.width(), turned.height()), (30, 40));
    }

    #[test]
    fn frame_from_rgba_validates_length() {
        let frame = Frame::from_rgba(4, 2, vec![0; 32], 90).expect("valid buffer");
        assert_eq!(frame.upright_dimensions(), (2, 4));
        assert_eq!(frame.upright().width(), 2);

        let err = Frame::from_rgba(4, 2, vec![0; 31], 0).unwrap_err();
        assert!(matches!(
            err,
            ScanwerkError::DimensionMismatch {
                expected: 32,
                actual: 31
            }
        ));
        assert!(Frame::from_rgba(4, 2, vec![0; 32], 100).is_err());
    }

    #[test]
    fn mask_from_gray_collapses_to_binary() {
        let mut gray = GrayImage::new(3, 1);
        gray.put_pixel(1, 0, Luma([7]));
        gray.put_pixel(2, 0, Luma([255]));
        let mask = Mask::from_gray(gray);
        assert!(!mask.is_document(0, 0));
        assert!(mask.is_document(1, 0));
        assert!(mask.is_document(2, 0));
        assert_eq!(mask.as_gray().get_pixel(1, 0).0[0], DOCUMENT);
        assert_eq!(mask.document_pixels(), 2);
    }

    #[test]
    fn mask_from_class_indices_checks_size() {
        let mask = Mask::from_class_indices(2, 2, &[0, 1, 2, 0]).unwrap();
        assert_eq!(mask.document_fraction(), 0.5);
        assert!(Mask::from_class_indices(2, 2, &[0, 1, 2]).is_err());
    }

    #[test]
    fn mask_from_logits_argmax() {
        // Two classes over a 2x1 image: plane 0 = background, plane 1 = document.
        let logits = [0.9, 0.1, 0.2, 0.8];
        let mask = Mask::from_logits(2, 1, 2, &logits).unwrap();
        assert!(!mask.is_document(0, 0));
        assert!(mask.is_document(1, 0));

        // Ties go to the background class.
        let tied = Mask::from_logits(1, 1, 2, &[0.5, 0.5]).unwrap();
        assert!(tied.is_empty());

        assert!(Mask::from_logits(2, 1, 2, &logits[..3]).is_err());
        assert!(Mask::from_logits(2, 1, 0, &[]).is_err());
    }

    #[test]
    fn empty_mask_is_all_background() {
        let mask = Mask::empty(10, 10);
        assert!(mask.is_empty());
        assert_eq!(mask.document_fraction(), 0.0);
        assert_eq!(mask.to_image().width(), 10);
    }

    #[test]
    fn detection_result_conversions() {
        let quad = Quad::new(
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        );
        let detected = DetectionResult::from(Some(quad));
        assert!(detected.is_detected());
        assert_eq!(detected.quad(), Some(&quad));
        assert_eq!(DetectionResult::from(None), DetectionResult::NotDetected);
        assert_eq!(DetectionResult::NotDetected.into_quad(), None);
    }

    #[test]
    fn out_of_range_pixels_are_background() {
        let mask = Mask::from_gray(GrayImage::from_pixel(4, 3, Luma([DOCUMENT])));
        assert!(mask.is_document(3, 2));
        assert!(!mask.is_document(4, 0));
        assert!(!mask.is_document(0, 3));
        assert!(!mask.is_document(u32::MAX, u32::MAX));
    }
}
