// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel option strings
//!
//! Channels can be declared with a single delimited string such as
//! `SOURCE=ec0.s1.AI_1;NFFT=1024;RM_DC=1;MODE=CONT;`. Pairs are separated by
//! `;`, keys are case-insensitive and unknown keys are ignored.

use log::debug;
use thiserror::Error;

pub const OPT_DBG_PRINT: &str = "DBG_PRINT";
pub const OPT_SOURCE: &str = "SOURCE";
pub const OPT_RESULT_ELEMENTS: &str = "RESULT_ELEMENTS";
pub const OPT_BUFFER_SIZE: &str = "BUFFERSIZE";
pub const OPT_NFFT: &str = "NFFT";
pub const OPT_ENABLE: &str = "ENABLE";
pub const OPT_APPLY_SCALE: &str = "APPLY_SCALE";
pub const OPT_RM_DC: &str = "RM_DC";
pub const OPT_RM_LIN: &str = "RM_LIN";
pub const OPT_MODE: &str = "MODE";
pub const OPT_RATE: &str = "RATE";
pub const OPT_TRIGG: &str = "TRIGG";
pub const OPT_SOURCE_NEXTTIME: &str = "SOURCE_NEXTTIME";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("Missing mandatory option {0}")]
    MissingKey(&'static str),

    #[error("Invalid value '{value}' for option {key}")]
    InvalidValue { key: String, value: String },
}

/// Types that can be built from a channel option string.
pub trait FromOptions: Sized {
    type Error;

    fn from_options(options: &str) -> Result<Self, Self::Error>;
}

/// One `KEY=value` pair with the key upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionPair<'a> {
    pub key: String,
    pub value: &'a str,
}

/// Split an option string into pairs, skipping empty and malformed entries.
pub fn parse_pairs(options: &str) -> Vec<OptionPair<'_>> {
    options
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) => Some(OptionPair {
                key: key.trim().to_ascii_uppercase(),
                value: value.trim(),
            }),
            None => {
                debug!("Ignoring option without value: '{}'", entry);
                None
            }
        })
        .collect()
}

fn invalid(key: &str, value: &str) -> OptionError {
    OptionError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub fn parse_flag(key: &str, value: &str) -> Result<bool, OptionError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

pub fn parse_count(key: &str, value: &str) -> Result<usize, OptionError> {
    value.parse::<usize>().map_err(|_| invalid(key, value))
}

pub fn parse_real(key: &str, value: &str) -> Result<f64, OptionError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(key, value)),
    }
}

pub fn parse_identifier(key: &str, value: &str) -> Result<String, OptionError> {
    if value.is_empty() {
        return Err(invalid(key, value));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs(" source=ec0.s1.AI_1 ; NFFT=8;;junk; MODE = CONT;");
        let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["SOURCE", "NFFT", "MODE"]);
        assert_eq!(pairs[0].value, "ec0.s1.AI_1");
        assert_eq!(pairs[2].value, "CONT");
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_flag(OPT_ENABLE, "1"), Ok(true));
        assert_eq!(parse_flag(OPT_ENABLE, "False"), Ok(false));
        assert!(parse_flag(OPT_ENABLE, "2").is_err());
        assert_eq!(parse_count(OPT_NFFT, "1024"), Ok(1024));
        assert!(parse_count(OPT_NFFT, "-1").is_err());
        assert_eq!(parse_real(OPT_RATE, "250.5"), Ok(250.5));
        assert!(parse_real(OPT_RATE, "inf").is_err());
        assert!(parse_identifier(OPT_SOURCE, "").is_err());
    }
}
