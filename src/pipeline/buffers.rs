// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Analysis window buffers

use rustfft::num_complex::Complex64;

use crate::spectral::spectrum_bins;

/// Every buffer of one analysis window, allocated once.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBuffers {
    /// Samples as decoded
    pub raw: Vec<f64>,
    /// Copy of `raw` modified in place by preprocessing
    pub preprocessed: Vec<f64>,
    pub spectrum_in: Vec<Complex64>,
    pub spectrum_out: Vec<Complex64>,
    /// `N/2 + 1` bins
    pub amplitude: Vec<f64>,
    filled: usize,
}

impl AnalysisBuffers {
    pub fn new(len: usize) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self {
            raw: vec![0.0; len],
            preprocessed: vec![0.0; len],
            spectrum_in: vec![zero; len],
            spectrum_out: vec![zero; len],
            amplitude: vec![0.0; spectrum_bins(len)],
            filled: 0,
        }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.raw.len()
    }

    /// Append one sample to both real buffers. Returns `false` once full.
    pub fn push(&mut self, value: f64) -> bool {
        if self.is_full() {
            return false;
        }
        self.raw[self.filled] = value;
        self.preprocessed[self.filled] = value;
        self.filled += 1;
        true
    }

    /// Zero every buffer and rewind.
    pub fn clear(&mut self) {
        let zero = Complex64::new(0.0, 0.0);
        self.raw.fill(0.0);
        self.preprocessed.fill(0.0);
        self.spectrum_in.fill(zero);
        self.spectrum_out.fill(zero);
        self.amplitude.fill(0.0);
        self.filled = 0;
    }
}
