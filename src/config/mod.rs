// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the scope application
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `host`: tick rate of the control loop and bus start-up delay
//! - `scopes`: trigger-aligned capture channels
//! - `analyzers`: spectrum analysis channels
//! - `simulation`: simulated signals and trigger latches
//!
//! Channel entries are either structured maps or option strings:
//!
//! ```yaml
//! scopes:
//!   - "SOURCE=ec0.s1.AI_1;TRIGG=ec0.s2.LATCH;SOURCE_NEXTTIME=ec0.s1.AI_1.nexttime;RESULT_ELEMENTS=400"
//! analyzers:
//!   - source: ec0.s1.AI_1
//!     nfft: 1024
//!     enable: true
//!     mode: continuous
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rust_rtscope::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(Some(500.0), None, false);
//!
//! println!("Tick rate: {} Hz", config.host.tick_rate_hz);
//! ```

pub mod analysis;
pub mod capture;
pub mod host;
pub mod options;
pub mod simulation;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use analysis::{AcquisitionMode, AnalysisConfig};
pub use capture::CaptureConfig;
pub use host::HostConfig;
pub use options::{FromOptions, OptionError};
pub use simulation::{SignalConfig, SimulationConfig, TriggerConfig};
pub use utils::output_config_schema;

/// A channel declared either as an option string or as a structured map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelEntry<T> {
    Options(String),
    Inline(T),
}

impl<T: FromOptions + Clone> ChannelEntry<T> {
    /// Resolve to a channel configuration, parsing the option string if needed.
    pub fn resolve(&self) -> Result<T, T::Error> {
        match self {
            ChannelEntry::Options(text) => T::from_options(text),
            ChannelEntry::Inline(config) => Ok(config.clone()),
        }
    }
}

/// Root configuration structure.
///
/// Deserialized from YAML and validated against the embedded JSON schema.
/// Every section falls back to its defaults when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Host control loop settings
    #[serde(default)]
    pub host: HostConfig,

    /// Trigger-aligned capture channels, indexed in declaration order
    #[serde(default)]
    pub scopes: Vec<ChannelEntry<CaptureConfig>>,

    /// Spectrum analysis channels, indexed in declaration order
    #[serde(default)]
    pub analyzers: Vec<ChannelEntry<AnalysisConfig>>,

    /// Simulated process image used by the daemon
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            scopes: vec![ChannelEntry::Options(
                "SOURCE=ec0.s1.AI_1;TRIGG=ec0.s2.LATCH;SOURCE_NEXTTIME=ec0.s1.AI_1.nexttime;RESULT_ELEMENTS=400;"
                    .to_string(),
            )],
            analyzers: vec![ChannelEntry::Inline(AnalysisConfig {
                source: "ec0.s1.AI_1".to_string(),
                nfft: 1024,
                enable: true,
                remove_mean: true,
                mode: AcquisitionMode::Continuous,
                ..AnalysisConfig::default()
            })],
            simulation: SimulationConfig::default(),
        }
    }
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. A file that
    /// fails schema validation, deserialization or the additional rules of
    /// [`utils::validate_specific_rules`] is rejected, and a
    /// `<name>.sample.yaml` with the defaults is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        Self::from_yaml_str(&contents, Some(path))
    }

    /// Parse and validate a YAML document.
    ///
    /// `origin` is used for messages and for writing the sample file.
    pub fn from_yaml_str(contents: &str, origin: Option<&Path>) -> Result<Self> {
        let label = origin.map_or_else(|| "<string>".to_string(), |p| p.display().to_string());

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(contents)
            .with_context(|| format!("Failed to parse YAML configuration from {}", label))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .with_context(|| format!("Failed to convert YAML to JSON for validation: {}", label))?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", label);
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            if let Some(path) = origin {
                Self::create_sample_config(path)?;
            }
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Some(path) = origin {
                    if let Err(e) = Self::create_sample_config(path) {
                        error!("Failed to create sample config: {}", e);
                    }
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    label,
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            if let Some(path) = origin {
                Self::create_sample_config(path)?;
            }
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// # Parameters
    ///
    /// * `tick_rate_hz` - Optional host tick rate in Hz
    /// * `startup_cycles` - Optional number of ticks before the bus is operational
    /// * `enable_all` - If true, every scope and analyzer starts enabled
    pub fn apply_args(
        &mut self,
        tick_rate_hz: Option<f64>,
        startup_cycles: Option<u64>,
        enable_all: bool,
    ) {
        if let Some(rate) = tick_rate_hz {
            debug!("Overriding tick rate from command line: {}", rate);
            self.host.tick_rate_hz = rate;
        }
        if let Some(cycles) = startup_cycles {
            debug!("Overriding startup cycles from command line: {}", cycles);
            self.host.startup_cycles = cycles;
        }
        if enable_all {
            debug!("Enabling every channel from command line");
            for entry in self.scopes.iter_mut() {
                if let Ok(mut config) = entry.resolve() {
                    config.enable = true;
                    *entry = ChannelEntry::Inline(config);
                }
            }
            for entry in self.analyzers.iter_mut() {
                if let Ok(mut config) = entry.resolve() {
                    config.enable = true;
                    *entry = ChannelEntry::Inline(config);
                }
            }
        }
    }

    /// Resolved capture channel configurations
    pub fn capture_configs(&self) -> Result<Vec<CaptureConfig>> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .resolve()
                    .with_context(|| format!("Invalid configuration for scope{}", index))
            })
            .collect()
    }

    /// Resolved analysis channel configurations
    pub fn analysis_configs(&self) -> Result<Vec<AnalysisConfig>> {
        self.analyzers
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .resolve()
                    .with_context(|| format!("Invalid configuration for fft{}", index))
            })
            .collect()
    }
}
