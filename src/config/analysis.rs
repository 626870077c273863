// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Spectrum analysis channel configuration

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use super::options::{self, FromOptions, OptionError};
use crate::acquisition::HostTiming;
use crate::pipeline::AnalysisError;

/// How windows are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// A new window starts as soon as the previous one was computed
    Continuous,
    /// Each window needs an explicit trigger command
    #[default]
    Triggered,
}

impl AcquisitionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AcquisitionMode::Continuous => "CONT",
            AcquisitionMode::Triggered => "TRIGG",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionMode {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONT" | "CONTINUOUS" => Ok(AcquisitionMode::Continuous),
            "TRIGG" | "TRIGGERED" => Ok(AcquisitionMode::Triggered),
            _ => Err(OptionError::InvalidValue {
                key: options::OPT_MODE.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration of one spectrum analysis channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Data source identifier
    pub source: String,

    /// Window length in samples, also the transform length
    #[serde(default = "default_nfft")]
    pub nfft: usize,

    /// Channels start disabled unless enabled here or by command
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub debug: bool,

    /// Multiply the spectrum by 1/N
    #[serde(default = "default_apply_scale")]
    pub apply_scale: bool,

    #[serde(default)]
    pub remove_mean: bool,

    #[serde(default)]
    pub remove_linear: bool,

    #[serde(default)]
    pub mode: AcquisitionMode,

    /// Analysis rate in Hz, defaults to the host tick rate
    #[serde(default)]
    pub sample_rate_hz: Option<f64>,
}

fn default_nfft() -> usize {
    4096
}

fn default_apply_scale() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            nfft: default_nfft(),
            enable: false,
            debug: false,
            apply_scale: default_apply_scale(),
            remove_mean: false,
            remove_linear: false,
            mode: AcquisitionMode::default(),
            sample_rate_hz: None,
        }
    }
}

impl AnalysisConfig {
    /// Analysis rate actually used for the given host
    pub fn effective_rate(&self, timing: &HostTiming) -> f64 {
        self.sample_rate_hz.unwrap_or(timing.tick_rate_hz)
    }

    /// Number of ticks skipped between two accepted batches.
    pub fn ignore_cycles(&self, timing: &HostTiming) -> u64 {
        let ratio = (timing.tick_rate_hz / self.effective_rate(timing)).floor();
        if ratio >= 1.0 {
            ratio as u64 - 1
        } else {
            0
        }
    }

    pub fn validate(&self, timing: &HostTiming) -> Result<(), AnalysisError> {
        if self.source.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                OptionError::MissingKey(options::OPT_SOURCE).to_string(),
            ));
        }
        if self.nfft == 0 {
            return Err(AnalysisError::InvalidConfig(
                "window length must be greater than zero".to_string(),
            ));
        }
        let rate = self.effective_rate(timing);
        if !(rate.is_finite() && rate > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "analysis rate must be positive, got {} Hz",
                rate
            )));
        }
        if rate > timing.tick_rate_hz {
            return Err(AnalysisError::InvalidConfig(format!(
                "analysis rate {} Hz exceeds the host tick rate {} Hz",
                rate, timing.tick_rate_hz
            )));
        }
        Ok(())
    }
}

impl FromOptions for AnalysisConfig {
    type Error = AnalysisError;

    fn from_options(text: &str) -> Result<Self, AnalysisError> {
        let mut config = AnalysisConfig::default();
        let invalid = |e: OptionError| AnalysisError::InvalidConfig(e.to_string());
        for pair in options::parse_pairs(text) {
            let (key, value) = (pair.key.as_str(), pair.value);
            match key {
                options::OPT_SOURCE => {
                    config.source = options::parse_identifier(key, value).map_err(invalid)?
                }
                options::OPT_NFFT | options::OPT_BUFFER_SIZE => {
                    config.nfft = options::parse_count(key, value).map_err(invalid)?
                }
                options::OPT_ENABLE => {
                    config.enable = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_DBG_PRINT => {
                    config.debug = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_APPLY_SCALE => {
                    config.apply_scale = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_RM_DC => {
                    config.remove_mean = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_RM_LIN => {
                    config.remove_linear = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_MODE => config.mode = value.parse().map_err(invalid)?,
                options::OPT_RATE => {
                    config.sample_rate_hz = Some(options::parse_real(key, value).map_err(invalid)?)
                }
                _ => debug!("Ignoring unknown analysis option {}={}", key, value),
            }
        }
        if config.source.is_empty() {
            return Err(invalid(OptionError::MissingKey(options::OPT_SOURCE)));
        }
        if config.nfft == 0 {
            return Err(AnalysisError::InvalidConfig(
                "window length must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
