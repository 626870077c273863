// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration of the simulated process image
//!
//! Each simulated signal exposes two sources: the sample data under `name`
//! and the timestamp of the next tick's first sample under
//! `<name>.nexttime`. Each simulated trigger exposes one latch timestamp
//! source under its `name`.

use serde::{Deserialize, Serialize};

use crate::acquisition::DataType;
use crate::utility::signal_generator::Waveform;

/// Suffix of the next-sample-time source generated for every signal
pub const NEXT_TIME_SUFFIX: &str = ".nexttime";

/// One simulated analog or counter input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub name: String,

    #[serde(default = "default_data_type")]
    pub data_type: DataType,

    /// Samples delivered per tick (oversampling factor)
    #[serde(default = "default_elements_per_cycle")]
    pub elements_per_cycle: usize,

    #[serde(default)]
    pub waveform: Waveform,

    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    #[serde(default = "default_amplitude")]
    pub amplitude: f64,

    #[serde(default)]
    pub offset: f64,

    /// Standard deviation of the added gaussian noise
    #[serde(default)]
    pub noise_amplitude: f64,

    /// Type of the next-sample-time counter; 32-bit counters wrap every ~4.3 s
    #[serde(default = "default_timestamp_type")]
    pub timestamp_type: DataType,
}

impl SignalConfig {
    pub fn next_time_name(&self) -> String {
        format!("{}{}", self.name, NEXT_TIME_SUFFIX)
    }
}

/// One simulated trigger latch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub name: String,

    /// Ticks between two latch events
    #[serde(default = "default_period_cycles")]
    pub period_cycles: u64,

    #[serde(default = "default_timestamp_type")]
    pub timestamp_type: DataType,
}

/// Simulated sources driven by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Initial value of the simulated clock in ns
    #[serde(default)]
    pub start_time_ns: u64,

    /// Seed for noise and trigger jitter, random when absent
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub signals: Vec<SignalConfig>,

    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

fn default_data_type() -> DataType {
    DataType::S16
}

fn default_elements_per_cycle() -> usize {
    10
}

fn default_frequency_hz() -> f64 {
    73.0
}

fn default_amplitude() -> f64 {
    2000.0
}

fn default_timestamp_type() -> DataType {
    DataType::U64
}

fn default_period_cycles() -> u64 {
    200
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            name: "ec0.s1.AI_1".to_string(),
            data_type: default_data_type(),
            elements_per_cycle: default_elements_per_cycle(),
            waveform: Waveform::default(),
            frequency_hz: default_frequency_hz(),
            amplitude: default_amplitude(),
            offset: 100.0,
            noise_amplitude: 20.0,
            timestamp_type: default_timestamp_type(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            name: "ec0.s2.LATCH".to_string(),
            period_cycles: default_period_cycles(),
            timestamp_type: default_timestamp_type(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time_ns: 0,
            seed: None,
            signals: vec![SignalConfig::default()],
            triggers: vec![TriggerConfig::default()],
        }
    }
}
