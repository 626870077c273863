// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//! Signal preprocessing module
//!
//! This module handles preprocessing of a captured analysis window before it
//! is transformed: mean removal and linear trend removal.

pub mod detrend;

use thiserror::Error;

pub use detrend::{least_squares, mean, remove_linear_trend, remove_mean, LinearFit};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessingError {
    #[error("Least-squares fit is degenerate for {samples} samples")]
    DegenerateFit { samples: usize },
}
