// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture channel configuration

use log::debug;
use serde::{Deserialize, Serialize};

use super::options::{self, FromOptions, OptionError};
use crate::capture::CaptureError;

/// Configuration of one trigger-aligned capture channel.
///
/// Immutable once the channel is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Data source identifier
    pub source: String,

    /// Trigger latch timestamp source identifier
    pub trigger: String,

    /// Identifier of the source holding the timestamp of the next tick's first sample
    pub next_time: String,

    /// Result window length in elements
    #[serde(default = "default_window_elements")]
    pub window_elements: usize,

    #[serde(default = "default_enable")]
    pub enable: bool,

    /// Log every finished window
    #[serde(default)]
    pub debug: bool,
}

fn default_window_elements() -> usize {
    4096
}

fn default_enable() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            trigger: String::new(),
            next_time: String::new(),
            window_elements: default_window_elements(),
            enable: default_enable(),
            debug: false,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.source.is_empty() {
            return Err(CaptureError::InvalidConfig(
                OptionError::MissingKey(options::OPT_SOURCE).to_string(),
            ));
        }
        if self.trigger.is_empty() {
            return Err(CaptureError::InvalidConfig(
                OptionError::MissingKey(options::OPT_TRIGG).to_string(),
            ));
        }
        if self.next_time.is_empty() {
            return Err(CaptureError::InvalidConfig(
                OptionError::MissingKey(options::OPT_SOURCE_NEXTTIME).to_string(),
            ));
        }
        if self.window_elements == 0 {
            return Err(CaptureError::InvalidConfig(
                "window length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromOptions for CaptureConfig {
    type Error = CaptureError;

    fn from_options(text: &str) -> Result<Self, CaptureError> {
        let mut config = CaptureConfig::default();
        let invalid = |e: OptionError| CaptureError::InvalidConfig(e.to_string());
        for pair in options::parse_pairs(text) {
            let (key, value) = (pair.key.as_str(), pair.value);
            match key {
                options::OPT_SOURCE => {
                    config.source = options::parse_identifier(key, value).map_err(invalid)?
                }
                options::OPT_TRIGG => {
                    config.trigger = options::parse_identifier(key, value).map_err(invalid)?
                }
                options::OPT_SOURCE_NEXTTIME => {
                    config.next_time = options::parse_identifier(key, value).map_err(invalid)?
                }
                options::OPT_RESULT_ELEMENTS | options::OPT_BUFFER_SIZE => {
                    config.window_elements = options::parse_count(key, value).map_err(invalid)?
                }
                options::OPT_ENABLE => {
                    config.enable = options::parse_flag(key, value).map_err(invalid)?
                }
                options::OPT_DBG_PRINT => {
                    config.debug = options::parse_flag(key, value).map_err(invalid)?
                }
                _ => debug!("Ignoring unknown capture option {}={}", key, value),
            }
        }
        config.validate()?;
        Ok(config)
    }
}
