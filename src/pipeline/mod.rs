// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition and analysis pipeline
//!
//! A [`SpectrumAnalyzer`] fills a fixed window of scalar samples from the
//! real-time tick and hands the full window to a dedicated worker thread,
//! which removes the mean and linear trend, runs the transform and publishes
//! the magnitude spectrum.
//!
//! ## Handoff
//!
//! The window buffers are a single boxed [`AnalysisBuffers`] whose ownership
//! moves through two single-slot channels:
//!
//! ```text
//!  tick (producer)  --jobs(1)-->  worker  --returns(1)-->  tick
//! ```
//!
//! While the worker owns the buffers the producer drops incoming batches, so
//! no window is ever written while it is being read and no lock is needed.
//! Teardown raises a cancellation flag and closes the job channel; the worker
//! checks the flag after every receive.

pub mod analyzer;
pub mod buffers;
pub mod worker;

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::{DecodeError, SourceError};
use crate::spectral::TransformError;

pub use crate::config::AcquisitionMode;
pub use analyzer::{BatchOutcome, DropReason, SpectrumAnalyzer};
pub use buffers::AnalysisBuffers;
pub use worker::{compute_pass, ComputeOptions};

/// Externally visible pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnalysisStatus {
    /// Source not bound yet
    None = 0,
    Idle = 1,
    Acquiring = 2,
    Computing = 3,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::None => "NONE",
            AnalysisStatus::Idle => "IDLE",
            AnalysisStatus::Acquiring => "ACQUIRING",
            AnalysisStatus::Computing => "COMPUTING",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => AnalysisStatus::Idle,
            2 => AnalysisStatus::Acquiring,
            3 => AnalysisStatus::Computing,
            _ => AnalysisStatus::None,
        }
    }
}

/// Status shared between the producer and the worker.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: AnalysisStatus) -> Self {
        StatusCell(AtomicU8::new(status as u8))
    }

    pub fn get(&self) -> AnalysisStatus {
        AnalysisStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `status`, returning whether it changed.
    pub fn set(&self, status: AnalysisStatus) -> bool {
        self.0.swap(status as u8, Ordering::AcqRel) != status as u8
    }
}

/// Errors raised by an analysis channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("Analysis of '{0}' executed before its source was bound")]
    NotBound(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Failed to start analysis worker: {0}")]
    WorkerSpawn(String),

    #[error("Analysis worker of fft{0} has stopped")]
    WorkerStopped(usize),
}
