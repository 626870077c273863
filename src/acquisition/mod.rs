// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample source acquisition
//!
//! This module defines the boundary between the capture/analysis engines and
//! the host that owns the process image. Every channel reads its data through
//! a [`SampleSource`] obtained once from a [`SourceRegistry`] when the host
//! enters real-time, then reads it synchronously on every tick.
//!
//! ## Components
//!
//! * [`DataType`]: the element type tag reported by a source
//! * [`decoder`]: conversion of tagged byte buffers to `f64` scalars
//! * [`mock`]: in-memory registry used by tests and by the simulator
//! * [`simulated`]: per-tick waveform, trigger and timestamp simulation

pub mod decoder;
pub mod mock;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use decoder::DecodeError;
pub use mock::MockBus;
pub use simulated::SimulatedBus;

/// Element type tag of a sample source.
///
/// The bit types are reported by some hosts for packed digital inputs. They
/// can be bound as trigger or timestamp sources but are rejected as sample
/// data since they have no byte-aligned numeric representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    B1,
    B2,
    B3,
    B4,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
    F32,
    F64,
}

impl DataType {
    /// Every byte-aligned numeric tag, in declaration order.
    pub const NUMERIC: [DataType; 10] = [
        DataType::U8,
        DataType::S8,
        DataType::U16,
        DataType::S16,
        DataType::U32,
        DataType::S32,
        DataType::U64,
        DataType::S64,
        DataType::F32,
        DataType::F64,
    ];

    /// Size of one element in bytes. Bit types occupy one byte.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::B1 | DataType::B2 | DataType::B3 | DataType::B4 => 1,
            DataType::U8 | DataType::S8 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::U32 | DataType::S32 | DataType::F32 => 4,
            DataType::U64 | DataType::S64 | DataType::F64 => 8,
        }
    }

    /// Number of significant bits of one element.
    pub fn bit_width(self) -> u32 {
        match self {
            DataType::B1 => 1,
            DataType::B2 => 2,
            DataType::B3 => 3,
            DataType::B4 => 4,
            other => other.byte_size() as u32 * 8,
        }
    }

    /// Whether the decoder can convert this type to a scalar.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            DataType::B1 | DataType::B2 | DataType::B3 | DataType::B4
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::S8 | DataType::S16 | DataType::S32 | DataType::S64
        ) || self.is_float()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::B1 => "B1",
            DataType::B2 => "B2",
            DataType::B3 => "B3",
            DataType::B4 => "B4",
            DataType::U8 => "U8",
            DataType::S8 => "S8",
            DataType::U16 => "U16",
            DataType::S16 => "S16",
            DataType::U32 => "U32",
            DataType::S32 => "S32",
            DataType::U64 => "U64",
            DataType::S64 => "S64",
            DataType::F32 => "F32",
            DataType::F64 => "F64",
        };
        f.write_str(name)
    }
}

/// Static description of a bound source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Identifier the source was bound with
    pub name: String,
    /// Element type tag
    pub data_type: DataType,
    /// Number of elements delivered per tick
    pub element_count: usize,
}

impl SourceInfo {
    pub fn new(name: impl Into<String>, data_type: DataType, element_count: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            element_count,
        }
    }

    /// Width of one element in bytes
    pub fn element_size(&self) -> usize {
        self.data_type.byte_size()
    }

    /// Size of one tick's worth of data in bytes
    pub fn byte_size(&self) -> usize {
        self.element_size() * self.element_count
    }
}

/// Errors raised while binding or reading a sample source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source '{0}' not found")]
    NotFound(String),

    #[error("Source '{name}' has unsupported data type {data_type}")]
    UnsupportedDataType { name: String, data_type: DataType },

    #[error("Source '{name}' delivers no elements")]
    Empty { name: String },

    #[error("Failed to read source '{name}': {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("Source '{name}' expected a buffer of {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// A bound sample source, read once per tick.
///
/// Implementations must not block beyond the tick budget and must not
/// allocate in [`SampleSource::read`].
pub trait SampleSource: Send {
    /// Description captured at bind time
    fn info(&self) -> &SourceInfo;

    /// Copy the latest tick's bytes into `buf`.
    ///
    /// `buf` must be exactly [`SourceInfo::byte_size`] long.
    fn read(&self, buf: &mut [u8]) -> Result<(), SourceError>;
}

/// Resolves source identifiers to bound [`SampleSource`] handles.
///
/// Called no earlier than when the host enters real-time, since some
/// sources only exist once the control program is loaded.
pub trait SourceRegistry {
    fn bind(&self, name: &str) -> Result<Box<dyn SampleSource>, SourceError>;
}

/// Fixed timing of the host control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostTiming {
    /// Tick rate in Hz
    pub tick_rate_hz: f64,
}

impl HostTiming {
    pub fn new(tick_rate_hz: f64) -> Self {
        Self { tick_rate_hz }
    }

    /// Tick period in nanoseconds, truncated to an integer.
    pub fn period_ns(&self) -> i64 {
        if self.tick_rate_hz <= 0.0 {
            return 0;
        }
        (1.0e9 / self.tick_rate_hz) as i64
    }

    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.period_ns().max(0) as u64)
    }
}

impl Default for HostTiming {
    fn default() -> Self {
        Self {
            tick_rate_hz: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_sizes() {
        assert_eq!(DataType::U8.byte_size(), 1);
        assert_eq!(DataType::S16.byte_size(), 2);
        assert_eq!(DataType::F32.byte_size(), 4);
        assert_eq!(DataType::U64.byte_size(), 8);
        assert_eq!(DataType::B3.byte_size(), 1);
        assert_eq!(DataType::B3.bit_width(), 3);
        assert_eq!(DataType::U32.bit_width(), 32);
    }

    #[test]
    fn test_numeric_flags() {
        assert!(DataType::NUMERIC.iter().all(|t| t.is_numeric()));
        assert!(!DataType::B1.is_numeric());
        assert!(DataType::F64.is_signed());
        assert!(!DataType::U16.is_signed());
    }

    #[test]
    fn test_source_info_sizes() {
        let info = SourceInfo::new("ec0.s1.AI_1", DataType::S16, 10);
        assert_eq!(info.element_size(), 2);
        assert_eq!(info.byte_size(), 20);
    }

    #[test]
    fn test_host_period() {
        assert_eq!(HostTiming::new(1000.0).period_ns(), 1_000_000);
        assert_eq!(HostTiming::new(500.0).period_ns(), 2_000_000);
        assert_eq!(HostTiming::new(0.0).period_ns(), 0);
    }
}
