// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.
//
// "No document found" is deliberately absent: it is an ordinary outcome and
// travels as `DetectionResult::NotDetected`, never as an error.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Imaging errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("quad is degenerate ({width}x{height}); refusing to rectify")]
    DegenerateQuad { width: u32, height: u32 },

    #[error("invalid rotation {0}; expected a multiple of 90 degrees")]
    InvalidRotation(i32),

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // -- Inference errors --
    #[error("segmentation inference failed: {0}")]
    Inference(String),

    #[error("failed to load segmentation model: {0}")]
    ModelLoad(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
