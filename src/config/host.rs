// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Host control loop configuration

use serde::{Deserialize, Serialize};

use crate::acquisition::HostTiming;

/// Settings of the host tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Tick rate of the control loop in Hz
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Ticks before the bus reports operational
    #[serde(default = "default_startup_cycles")]
    pub startup_cycles: u64,

    /// Interval between heartbeat log lines, in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_tick_rate_hz() -> f64 {
    1000.0
}

fn default_startup_cycles() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    60
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            startup_cycles: default_startup_cycles(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl HostConfig {
    pub fn timing(&self) -> HostTiming {
        HostTiming::new(self.tick_rate_hz)
    }
}
