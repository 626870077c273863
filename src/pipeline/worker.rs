// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Compute worker
//!
//! Runs the preprocessing, transform and derived-output sequence on a full
//! window, off the real-time tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use rustfft::num_complex::Complex64;

use super::{AnalysisBuffers, AnalysisError, AnalysisStatus, StatusCell};
use crate::config::AnalysisConfig;
use crate::preprocessing::{remove_linear_trend, remove_mean, PreprocessingError};
use crate::publish::{BufferId, ParamKey, ParamValue, ResultPublisher};
use crate::spectral::{magnitude, scale, Transform};

/// Preprocessing switches of a compute pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputeOptions {
    pub remove_mean: bool,
    pub remove_linear: bool,
    pub apply_scale: bool,
}

impl From<&AnalysisConfig> for ComputeOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            remove_mean: config.remove_mean,
            remove_linear: config.remove_linear,
            apply_scale: config.apply_scale,
        }
    }
}

/// Preprocess and transform a full window in place.
///
/// A degenerate trend fit is not an error: the trend stage is skipped and
/// the returned value is `Some` with the reason.
pub fn compute_pass(
    options: &ComputeOptions,
    transform: &mut dyn Transform,
    buffers: &mut AnalysisBuffers,
) -> Result<Option<PreprocessingError>, AnalysisError> {
    let mut skipped = None;

    if options.remove_mean {
        remove_mean(&mut buffers.preprocessed);
    }
    if options.remove_linear {
        if let Err(e) = remove_linear_trend(&mut buffers.preprocessed) {
            skipped = Some(e);
        }
    }

    for (slot, value) in buffers.spectrum_in.iter_mut().zip(&buffers.preprocessed) {
        *slot = Complex64::new(*value, 0.0);
    }
    transform.process(&buffers.spectrum_in, &mut buffers.spectrum_out)?;

    if options.apply_scale {
        scale(&mut buffers.spectrum_out);
    }
    magnitude(&buffers.spectrum_out, &mut buffers.amplitude);
    Ok(skipped)
}

/// State owned by the worker thread.
pub(crate) struct WorkerContext {
    pub index: usize,
    pub options: ComputeOptions,
    pub debug: bool,
    pub transform: Box<dyn Transform>,
    pub frequency_axis: Vec<f64>,
    pub publisher: Arc<dyn ResultPublisher>,
    pub status: Arc<StatusCell>,
}

impl WorkerContext {
    fn key(&self, buffer: BufferId) -> ParamKey {
        ParamKey::fft(self.index, buffer)
    }

    fn set_status(&self, status: AnalysisStatus) {
        if self.status.set(status) {
            self.publisher
                .publish(self.key(BufferId::Status), ParamValue::Text(status.as_str()));
        }
    }

    fn run_pass(&mut self, buffers: &mut AnalysisBuffers) {
        match compute_pass(&self.options, self.transform.as_mut(), buffers) {
            Ok(skipped) => {
                if let Some(reason) = skipped {
                    warn!("fft{}: linear trend removal skipped: {}", self.index, reason);
                }
                self.publish(buffers);
            }
            Err(e) => error!("fft{}: compute pass failed: {}", self.index, e),
        }
    }

    fn publish(&self, buffers: &AnalysisBuffers) {
        self.publisher
            .publish(self.key(BufferId::RawData), ParamValue::Reals(&buffers.raw));
        self.publisher.publish(
            self.key(BufferId::PreprocData),
            ParamValue::Reals(&buffers.preprocessed),
        );
        self.publisher.publish(
            self.key(BufferId::Amplitude),
            ParamValue::Reals(&buffers.amplitude),
        );
        self.publisher.publish(
            self.key(BufferId::XAxis),
            ParamValue::Reals(&self.frequency_axis),
        );

        if self.debug {
            let peak = buffers
                .amplitude
                .iter()
                .enumerate()
                .skip(1)
                .max_by(|a, b| a.1.total_cmp(b.1));
            if let Some((bin, value)) = peak {
                let freq = self.frequency_axis.get(bin).copied().unwrap_or_default();
                info!(
                    "fft{}: window of {} samples, peak {:.6} at {:.3} Hz (bin {})",
                    self.index,
                    buffers.len(),
                    value,
                    freq,
                    bin
                );
            }
        }
    }
}

/// Start the worker thread of channel `ctx.index`.
///
/// The worker waits on `jobs` without timeout, computes every window it
/// receives and sends the cleared buffers back on `returns`. It exits when
/// `jobs` is closed or `cancel` is raised.
pub(crate) fn spawn_worker(
    mut ctx: WorkerContext,
    jobs: Receiver<Box<AnalysisBuffers>>,
    returns: Sender<Box<AnalysisBuffers>>,
    cancel: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AnalysisError> {
    let name = format!("fft{}-worker", ctx.index);
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            debug!("fft{}: worker started", ctx.index);
            while let Ok(mut buffers) = jobs.recv() {
                if cancel.load(Ordering::Acquire) {
                    debug!("fft{}: worker cancelled", ctx.index);
                    break;
                }
                ctx.run_pass(&mut buffers);
                buffers.clear();
                ctx.set_status(AnalysisStatus::Idle);
                if returns.send(buffers).is_err() {
                    break;
                }
            }
            debug!("fft{}: worker stopped", ctx.index);
        })
        .map_err(|e| AnalysisError::WorkerSpawn(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::RustFftTransform;
    use approx::assert_abs_diff_eq;

    fn filled(values: &[f64]) -> AnalysisBuffers {
        let mut buffers = AnalysisBuffers::new(values.len());
        for v in values {
            buffers.push(*v);
        }
        buffers
    }

    #[test]
    fn test_dc_input_gives_empty_spectrum() {
        let mut buffers = filled(&[7.5; 16]);
        let options = ComputeOptions {
            remove_mean: true,
            ..ComputeOptions::default()
        };
        let mut fft = RustFftTransform::new(16);
        compute_pass(&options, &mut fft, &mut buffers).unwrap();
        for v in &buffers.preprocessed {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
        for v in &buffers.amplitude {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
        // Raw samples are untouched
        assert!(buffers.raw.iter().all(|v| *v == 7.5));
    }

    #[test]
    fn test_linear_input_is_flattened() {
        let values: Vec<f64> = (0..32).map(|x| 0.5 * x as f64 - 3.0).collect();
        let mut buffers = filled(&values);
        let options = ComputeOptions {
            remove_linear: true,
            apply_scale: true,
            ..ComputeOptions::default()
        };
        let mut fft = RustFftTransform::new(32);
        assert_eq!(compute_pass(&options, &mut fft, &mut buffers).unwrap(), None);
        for v in &buffers.preprocessed {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-9);
        }
        for v in &buffers.amplitude {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_degenerate_trend_is_skipped() {
        let mut buffers = filled(&[2.0]);
        let options = ComputeOptions {
            remove_linear: true,
            ..ComputeOptions::default()
        };
        let mut fft = RustFftTransform::new(1);
        let skipped = compute_pass(&options, &mut fft, &mut buffers).unwrap();
        assert_eq!(skipped, Some(PreprocessingError::DegenerateFit { samples: 1 }));
        assert_abs_diff_eq!(buffers.amplitude[0], 2.0);
    }

    #[test]
    fn test_scaling() {
        let mut scaled = filled(&[1.0; 8]);
        let mut unscaled = filled(&[1.0; 8]);
        let mut fft = RustFftTransform::new(8);
        let with_scale = ComputeOptions {
            apply_scale: true,
            ..ComputeOptions::default()
        };
        compute_pass(&with_scale, &mut fft, &mut scaled).unwrap();
        compute_pass(&ComputeOptions::default(), &mut fft, &mut unscaled).unwrap();
        assert_abs_diff_eq!(scaled.amplitude[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(unscaled.amplitude[0], 8.0, epsilon = 1e-12);
    }
}
