// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Trigger-aligned capture
//!
//! The [`CaptureEngine`] assembles fixed-size windows of raw source elements
//! anchored on an external trigger timestamp. It does all its work inline in
//! the tick and has no worker.

pub mod engine;
pub mod timestamp;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::SourceError;

pub use engine::CaptureEngine;
pub use timestamp::{time_diff, CounterWidth, TimeDelta};

/// Capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    /// Sources not bound yet
    Invalid,
    WaitTrigger,
    Collecting,
}

impl CaptureState {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureState::Invalid => "INVALID",
            CaptureState::WaitTrigger => "WAIT_TRIGGER",
            CaptureState::Collecting => "COLLECTING",
        }
    }
}

/// Errors raised by a capture channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture of '{0}' executed before its sources were bound")]
    NotBound(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}
