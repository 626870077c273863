// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line. It outputs the full JSON schema for the configuration
/// to stdout, formatted for readability.
///
/// # Example
///
/// ```bash
/// ./rust_rtscope --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    // Load the schema from the embedded string
    let schema_str = include_str!("../../resources/config.schema.json");

    // Parse the schema to a JSON Value to pretty-format it
    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    // Pretty-print the schema
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    // Output to stdout
    println!("{}", formatted_schema);

    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Tick rate**: must be finite and strictly positive
/// - **Channels**: every option string must parse and every channel must pass
///   its own validation, including the analysis rate against the tick rate
/// - **Simulation**: simulated source names must be unique
///
/// Channels reading sources that the simulation does not provide only emit
/// a warning, since a real host may provide them.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let rate = config.host.tick_rate_hz;
    if !rate.is_finite() || rate <= 0.0 {
        anyhow::bail!("Invalid tick rate: {}", rate);
    }
    let timing = config.host.timing();

    let mut simulated = HashSet::new();
    for signal in &config.simulation.signals {
        for name in [signal.name.clone(), signal.next_time_name()] {
            if !simulated.insert(name.clone()) {
                anyhow::bail!("Duplicate simulated source name: {}", name);
            }
        }
    }
    for trigger in &config.simulation.triggers {
        if !simulated.insert(trigger.name.clone()) {
            anyhow::bail!("Duplicate simulated source name: {}", trigger.name);
        }
    }

    let warn_unknown = |channel: &str, name: &str| {
        if !simulated.contains(name) {
            warn!(
                "{} reads '{}' which is not provided by the simulation",
                channel, name
            );
        }
    };

    for (index, capture) in config.capture_configs()?.iter().enumerate() {
        capture
            .validate()
            .with_context(|| format!("Invalid configuration for scope{}", index))?;
        let channel = format!("scope{}", index);
        warn_unknown(&channel, &capture.source);
        warn_unknown(&channel, &capture.trigger);
        warn_unknown(&channel, &capture.next_time);
    }

    for (index, analysis) in config.analysis_configs()?.iter().enumerate() {
        analysis
            .validate(&timing)
            .with_context(|| format!("Invalid configuration for fft{}", index))?;
        warn_unknown(&format!("fft{}", index), &analysis.source);
    }

    Ok(())
}
