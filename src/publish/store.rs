// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Parameter store
//!
//! Keeps the latest value, an update counter and the update time of every
//! published parameter. Readers can block until a parameter has been
//! published a given number of times, which is how callers observe results
//! produced by the analysis workers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use super::{ParamKey, ParamValue, ResultPublisher};
use crate::acquisition::decoder::decode_iter;
use crate::acquisition::DataType;

/// Owned copy of a published value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredValue {
    Samples {
        data_type: DataType,
        #[serde(skip)]
        bytes: Vec<u8>,
        values: Vec<f64>,
    },
    Reals(Vec<f64>),
    Integer(i64),
    Real(f64),
    Flag(bool),
    Text(String),
}

impl StoredValue {
    fn from_param(value: ParamValue<'_>) -> Self {
        match value {
            ParamValue::Samples { data_type, bytes } => {
                let values = match decode_iter(data_type, bytes) {
                    Ok(iter) => iter.collect(),
                    Err(e) => {
                        warn!("Stored {} bytes that cannot be decoded: {}", bytes.len(), e);
                        Vec::new()
                    }
                };
                StoredValue::Samples {
                    data_type,
                    bytes: bytes.to_vec(),
                    values,
                }
            }
            ParamValue::Reals(values) => StoredValue::Reals(values.to_vec()),
            ParamValue::Integer(v) => StoredValue::Integer(v),
            ParamValue::Real(v) => StoredValue::Real(v),
            ParamValue::Flag(v) => StoredValue::Flag(v),
            ParamValue::Text(v) => StoredValue::Text(v.to_string()),
        }
    }
}

/// Latest state of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub value: StoredValue,
    pub updates: u64,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe store of published parameters.
#[derive(Debug, Default)]
pub struct ParameterStore {
    entries: Mutex<HashMap<ParamKey, StoredEntry>>,
    changed: Condvar,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ParamKey, StoredEntry>> {
        // A panic while holding the lock leaves the map itself intact
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: ParamKey) -> Option<StoredEntry> {
        self.lock().get(&key).cloned()
    }

    /// Number of times `key` has been published
    pub fn update_count(&self, key: ParamKey) -> u64 {
        self.lock().get(&key).map_or(0, |entry| entry.updates)
    }

    pub fn integer(&self, key: ParamKey) -> Option<i64> {
        match self.get(key)?.value {
            StoredValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn real(&self, key: ParamKey) -> Option<f64> {
        match self.get(key)?.value {
            StoredValue::Real(v) => Some(v),
            StoredValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn flag(&self, key: ParamKey) -> Option<bool> {
        match self.get(key)?.value {
            StoredValue::Flag(v) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, key: ParamKey) -> Option<String> {
        match self.get(key)?.value {
            StoredValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Real-valued buffers, or decoded samples
    pub fn reals(&self, key: ParamKey) -> Option<Vec<f64>> {
        match self.get(key)?.value {
            StoredValue::Reals(v) => Some(v),
            StoredValue::Samples { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Raw bytes of a samples buffer
    pub fn bytes(&self, key: ParamKey) -> Option<Vec<u8>> {
        match self.get(key)?.value {
            StoredValue::Samples { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Block until `key` has been published at least `count` times.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_updates(&self, key: ParamKey, count: u64, timeout: Duration) -> bool {
        self.wait_until(timeout, |entries| {
            entries.get(&key).is_some_and(|entry| entry.updates >= count)
        })
    }

    /// Block until the text value of `key` equals `expected`.
    pub fn wait_for_text(&self, key: ParamKey, expected: &str, timeout: Duration) -> bool {
        self.wait_until(timeout, |entries| {
            matches!(
                entries.get(&key),
                Some(StoredEntry { value: StoredValue::Text(v), .. }) if v == expected
            )
        })
    }

    fn wait_until(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&HashMap<ParamKey, StoredEntry>) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let mut entries = self.lock();
        loop {
            if done(&entries) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            entries = match self.changed.wait_timeout(entries, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// All parameters keyed by their display name, sorted.
    pub fn snapshot(&self) -> BTreeMap<String, StoredEntry> {
        self.lock()
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.snapshot())
    }
}

impl ResultPublisher for ParameterStore {
    fn publish(&self, key: ParamKey, value: ParamValue<'_>) {
        let value = StoredValue::from_param(value);
        let mut entries = self.lock();
        let now = Utc::now();
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.updates += 1;
                entry.updated_at = now;
            }
            None => {
                entries.insert(
                    key,
                    StoredEntry {
                        value,
                        updates: 1,
                        updated_at: now,
                    },
                );
            }
        }
        drop(entries);
        self.changed.notify_all();
    }
}
