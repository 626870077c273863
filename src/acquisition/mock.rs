// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory source registry
//!
//! [`MockBus`] stands in for the host process image. Sources are declared
//! with [`MockBus::add_source`], written through the returned
//! [`MockHandle`], and bound by the engines through the [`SourceRegistry`]
//! trait exactly like real sources. Read failures can be injected per source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use super::decoder::{encode_counter, encode_element, DecodeError};
use super::{SampleSource, SourceError, SourceInfo, SourceRegistry};

#[derive(Debug)]
struct SlotState {
    bytes: Vec<u8>,
    failure: Option<String>,
}

#[derive(Debug)]
struct Slot {
    info: SourceInfo,
    state: Mutex<SlotState>,
}

/// Shared in-memory process image. Cloning shares the same sources.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    slots: Arc<Mutex<HashMap<String, Arc<Slot>>>>,
}

/// Writer side of one mock source.
#[derive(Debug, Clone)]
pub struct MockHandle {
    slot: Arc<Slot>,
}

struct MockSource {
    slot: Arc<Slot>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a source, zero-initialised. Redeclaring a name replaces it.
    pub fn add_source(&self, info: SourceInfo) -> MockHandle {
        debug!(
            "Adding mock source '{}' ({} x {})",
            info.name, info.element_count, info.data_type
        );
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                bytes: vec![0u8; info.byte_size()],
                failure: None,
            }),
            info,
        });
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(slot.info.name.clone(), Arc::clone(&slot));
        }
        MockHandle { slot }
    }

    /// Writer handle for an existing source
    pub fn handle(&self, name: &str) -> Option<MockHandle> {
        let slots = self.slots.lock().ok()?;
        slots.get(name).map(|slot| MockHandle {
            slot: Arc::clone(slot),
        })
    }

    pub fn source_names(&self) -> Vec<String> {
        match self.slots.lock() {
            Ok(slots) => {
                let mut names: Vec<String> = slots.keys().cloned().collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}

impl SourceRegistry for MockBus {
    fn bind(&self, name: &str) -> Result<Box<dyn SampleSource>, SourceError> {
        let slots = self.slots.lock().map_err(|_| SourceError::ReadFailed {
            name: name.to_string(),
            reason: "source table poisoned".to_string(),
        })?;
        let slot = slots
            .get(name)
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;
        Ok(Box::new(MockSource {
            slot: Arc::clone(slot),
        }))
    }
}

impl MockHandle {
    pub fn info(&self) -> &SourceInfo {
        &self.slot.info
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SlotState) -> R) -> Option<R> {
        self.slot.state.lock().ok().map(|mut state| f(&mut state))
    }

    /// Replace the whole buffer; extra bytes are ignored, missing bytes are zeroed.
    pub fn write_bytes(&self, bytes: &[u8]) {
        self.with_state(|state| {
            let len = bytes.len().min(state.bytes.len());
            state.bytes[..len].copy_from_slice(&bytes[..len]);
            state.bytes[len..].fill(0);
        });
    }

    /// Encode `values` element by element with the source data type.
    pub fn write_values(&self, values: &[f64]) -> Result<(), DecodeError> {
        let data_type = self.slot.info.data_type;
        let size = data_type.byte_size();
        self.with_state(|state| {
            for (value, chunk) in values.iter().zip(state.bytes.chunks_exact_mut(size)) {
                encode_element(data_type, *value, chunk)?;
            }
            Ok(())
        })
        .unwrap_or(Ok(()))
    }

    /// Store a counter value in the first element.
    pub fn write_counter(&self, value: u64) -> Result<(), DecodeError> {
        let data_type = self.slot.info.data_type;
        self.with_state(|state| encode_counter(data_type, value, &mut state.bytes))
            .unwrap_or(Ok(()))
    }

    /// Make every subsequent read fail with `reason`, or clear the failure.
    pub fn set_failure(&self, reason: Option<&str>) {
        self.with_state(|state| state.failure = reason.map(str::to_string));
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.with_state(|state| state.bytes.clone()).unwrap_or_default()
    }
}

impl SampleSource for MockSource {
    fn info(&self) -> &SourceInfo {
        &self.slot.info
    }

    fn read(&self, buf: &mut [u8]) -> Result<(), SourceError> {
        let name = &self.slot.info.name;
        let state = self.slot.state.lock().map_err(|_| SourceError::ReadFailed {
            name: name.clone(),
            reason: "source poisoned".to_string(),
        })?;
        if let Some(reason) = &state.failure {
            return Err(SourceError::ReadFailed {
                name: name.clone(),
                reason: reason.clone(),
            });
        }
        if buf.len() != state.bytes.len() {
            return Err(SourceError::SizeMismatch {
                name: name.clone(),
                expected: state.bytes.len(),
                actual: buf.len(),
            });
        }
        buf.copy_from_slice(&state.bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::DataType;

    #[test]
    fn test_bind_and_read() {
        let bus = MockBus::new();
        let handle = bus.add_source(SourceInfo::new("ai", DataType::S16, 2));
        handle.write_values(&[-3.0, 4.0]).unwrap();

        let source = bus.bind("ai").unwrap();
        assert_eq!(source.info().element_count, 2);
        let mut buf = [0u8; 4];
        source.read(&mut buf).unwrap();
        assert_eq!(buf, [0xfd, 0xff, 0x04, 0x00]);
    }

    #[test]
    fn test_unknown_source() {
        let bus = MockBus::new();
        assert_eq!(
            bus.bind("missing").err(),
            Some(SourceError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_injected_failure() {
        let bus = MockBus::new();
        let handle = bus.add_source(SourceInfo::new("ts", DataType::U64, 1));
        let source = bus.bind("ts").unwrap();
        handle.set_failure(Some("bus error"));
        let mut buf = [0u8; 8];
        assert!(matches!(
            source.read(&mut buf),
            Err(SourceError::ReadFailed { .. })
        ));
        handle.set_failure(None);
        handle.write_counter(77).unwrap();
        source.read(&mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf), 77);
    }

    #[test]
    fn test_size_mismatch() {
        let bus = MockBus::new();
        bus.add_source(SourceInfo::new("ai", DataType::U8, 4));
        let source = bus.bind("ai").unwrap();
        let mut buf = [0u8; 3];
        assert!(matches!(
            source.read(&mut buf),
            Err(SourceError::SizeMismatch { .. })
        ));
    }
}
