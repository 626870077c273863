// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Result publication
//!
//! Engines push finished buffers and status changes through the
//! [`ResultPublisher`] trait. Publishing is fire-and-forget: the engines never
//! wait for an acknowledgement, and values are passed by reference so the
//! real-time side does not allocate. Whatever copying is needed belongs to
//! the publisher.
//!
//! Parameters are addressed with a [`ParamKey`] rendered as
//! `<kind><index>.<name>`, e.g. `scope0.resultdata` or `fft1.fftamplitude`.

pub mod store;

use std::fmt;
use std::sync::Arc;

use log::{debug, log_enabled, Level};
use serde::{Deserialize, Serialize};

use crate::acquisition::DataType;

pub use store::{ParameterStore, StoredEntry, StoredValue};

/// Engine family owning a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelKind {
    Scope,
    Fft,
}

impl ChannelKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ChannelKind::Scope => "scope",
            ChannelKind::Fft => "fft",
        }
    }
}

/// Published buffers, counters and status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BufferId {
    /// Finished capture window
    ResultData,
    MissedTriggers,
    TriggerCount,
    /// Signed sample distance between the last trigger and the next sample
    SamplesToTrigger,
    Enable,
    Source,
    TriggerSource,
    NextTimeSource,
    RawData,
    PreprocData,
    Amplitude,
    XAxis,
    Status,
    Mode,
    Nfft,
    SampleRate,
    Armed,
}

impl BufferId {
    pub fn name(self) -> &'static str {
        match self {
            BufferId::ResultData => "resultdata",
            BufferId::MissedTriggers => "missed",
            BufferId::TriggerCount => "count",
            BufferId::SamplesToTrigger => "samplestotrigger",
            BufferId::Enable => "enable",
            BufferId::Source => "source",
            BufferId::TriggerSource => "trigg",
            BufferId::NextTimeSource => "nexttime",
            BufferId::RawData => "rawdata",
            BufferId::PreprocData => "preprocdata",
            BufferId::Amplitude => "fftamplitude",
            BufferId::XAxis => "fftxaxis",
            BufferId::Status => "status",
            BufferId::Mode => "mode",
            BufferId::Nfft => "nfft",
            BufferId::SampleRate => "samplerate",
            BufferId::Armed => "armed",
        }
    }
}

/// Fully qualified parameter address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamKey {
    pub kind: ChannelKind,
    pub index: usize,
    pub buffer: BufferId,
}

impl ParamKey {
    pub fn scope(index: usize, buffer: BufferId) -> Self {
        Self {
            kind: ChannelKind::Scope,
            index,
            buffer,
        }
    }

    pub fn fft(index: usize, buffer: BufferId) -> Self {
        Self {
            kind: ChannelKind::Fft,
            index,
            buffer,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", self.kind.prefix(), self.index, self.buffer.name())
    }
}

/// Borrowed value handed to a publisher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<'a> {
    /// Raw elements of a source type
    Samples { data_type: DataType, bytes: &'a [u8] },
    Reals(&'a [f64]),
    Integer(i64),
    Real(f64),
    Flag(bool),
    Text(&'a str),
}

/// Sink for published results.
pub trait ResultPublisher: Send + Sync {
    fn publish(&self, key: ParamKey, value: ParamValue<'_>);
}

/// Publisher that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl ResultPublisher for LogPublisher {
    fn publish(&self, key: ParamKey, value: ParamValue<'_>) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        match value {
            ParamValue::Samples { data_type, bytes } => {
                debug!("{} <- {} bytes of {}", key, bytes.len(), data_type)
            }
            ParamValue::Reals(values) => debug!("{} <- {} values", key, values.len()),
            ParamValue::Integer(v) => debug!("{} <- {}", key, v),
            ParamValue::Real(v) => debug!("{} <- {}", key, v),
            ParamValue::Flag(v) => debug!("{} <- {}", key, v),
            ParamValue::Text(v) => debug!("{} <- {}", key, v),
        }
    }
}

/// Forwards every publication to several publishers in order.
#[derive(Default, Clone)]
pub struct FanoutPublisher {
    targets: Vec<Arc<dyn ResultPublisher>>,
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn ResultPublisher>) -> Self {
        self.targets.push(target);
        self
    }
}

impl ResultPublisher for FanoutPublisher {
    fn publish(&self, key: ParamKey, value: ParamValue<'_>) {
        for target in &self.targets {
            target.publish(key, value);
        }
    }
}
