// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! FFT implementation for spectral analysis

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use super::{Transform, TransformError};

/// Forward transform backed by `rustfft`.
///
/// The plan and the scratch buffer are created once, so [`Transform::process`]
/// does not allocate.
pub struct RustFftTransform {
    fft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl RustFftTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self { fft, scratch }
    }
}

impl Transform for RustFftTransform {
    fn len(&self) -> usize {
        self.fft.len()
    }

    fn process(
        &mut self,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> Result<(), TransformError> {
        let len = self.len();
        if input.len() != len || output.len() != len {
            return Err(TransformError::LengthMismatch {
                expected: len,
                input: input.len(),
                output: output.len(),
            });
        }
        output.copy_from_slice(input);
        self.fft.process_with_scratch(output, &mut self.scratch);
        Ok(())
    }
}

/// Number of meaningful bins of a real-input spectrum of length `n`.
pub fn spectrum_bins(n: usize) -> usize {
    n / 2 + 1
}

/// Modulus of the first `magnitude.len()` bins.
pub fn magnitude(spectrum: &[Complex64], magnitude: &mut [f64]) {
    for (out, value) in magnitude.iter_mut().zip(spectrum) {
        *out = value.norm();
    }
}

/// Multiply every bin by `1/N`.
pub fn scale(spectrum: &mut [Complex64]) {
    if spectrum.is_empty() {
        return;
    }
    let factor = 1.0 / spectrum.len() as f64;
    for value in spectrum.iter_mut() {
        *value *= factor;
    }
}

/// Frequency of every meaningful bin.
///
/// `sample_rate_hz` is the analysis rate in batches per second and
/// `elements_per_batch` the number of samples each batch contributes, so the
/// effective sampling frequency is their product.
pub fn frequency_axis(nfft: usize, sample_rate_hz: f64, elements_per_batch: usize) -> Vec<f64> {
    if nfft == 0 {
        return Vec::new();
    }
    let step = sample_rate_hz * elements_per_batch as f64 / nfft as f64;
    (0..spectrum_bins(nfft)).map(|i| i as f64 * step).collect()
}
