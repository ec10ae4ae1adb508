// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk core: geometry, data model, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod types;

pub use config::ScannerConfig;
pub use error::ScanwerkError;
pub use geometry::{Line, Point, Quad, build_quad, polygon_area, rotate_quad, scale_quad};
pub use types::*;
