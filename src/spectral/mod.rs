// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//!
//! Spectral analysis module
//!
//! This module handles the discrete Fourier transform of an analysis window
//! and the derived outputs (magnitude spectrum, frequency axis).

mod fft;

use rustfft::num_complex::Complex64;
use thiserror::Error;

pub use fft::{frequency_axis, magnitude, scale, spectrum_bins, RustFftTransform};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Transform of length {expected} called with input {input} and output {output}")]
    LengthMismatch {
        expected: usize,
        input: usize,
        output: usize,
    },
}

/// Complex forward transform of a fixed length.
pub trait Transform: Send {
    /// Transform length, fixed at construction
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transform `input` into `output`; both must have [`Transform::len`] elements.
    fn process(
        &mut self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError>;
}

/// Create the default transform for windows of `len` samples
pub fn create_transform(len: usize) -> Box<dyn Transform> {
    Box::new(RustFftTransform::new(len))
}
