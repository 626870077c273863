// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mockall::mock;
use rust_rtscope::acquisition::{
    DataType, HostTiming, MockBus, SampleSource, SourceError, SourceInfo, SourceRegistry,
};
use rust_rtscope::capture::{CaptureEngine, CaptureError, CaptureState};
use rust_rtscope::config::{AcquisitionMode, AnalysisConfig, CaptureConfig};
use rust_rtscope::pipeline::{AnalysisError, SpectrumAnalyzer};
use rust_rtscope::publish::ParameterStore;

mock! {
    pub Source {}

    impl SampleSource for Source {
        fn info(&self) -> &SourceInfo;
        fn read(&self, buf: &mut [u8]) -> Result<(), SourceError>;
    }
}

/// Serves mocked sources first and falls back to a [`MockBus`].
struct MixedRegistry {
    mocks: Mutex<HashMap<String, Box<dyn SampleSource>>>,
    bus: MockBus,
}

impl MixedRegistry {
    fn new(bus: MockBus) -> Self {
        Self {
            mocks: Mutex::new(HashMap::new()),
            bus,
        }
    }

    fn with_mock(self, name: &str, source: MockSource) -> Self {
        self.mocks
            .lock()
            .unwrap()
            .insert(name.to_string(), Box::new(source));
        self
    }
}

impl SourceRegistry for MixedRegistry {
    fn bind(&self, name: &str) -> Result<Box<dyn SampleSource>, SourceError> {
        match self.mocks.lock().unwrap().remove(name) {
            Some(source) => Ok(source),
            None => self.bus.bind(name),
        }
    }
}

/// A source whose first `good_reads` reads succeed with `fill`, then fail.
fn failing_source(info: SourceInfo, good_reads: usize, fill: Vec<u8>) -> MockSource {
    let mut source = MockSource::new();
    source.expect_info().return_const(info);
    let calls = AtomicUsize::new(0);
    source.expect_read().returning(move |buf| {
        if calls.fetch_add(1, Ordering::SeqCst) < good_reads {
            for (dst, src) in buf.iter_mut().zip(fill.iter().cycle()) {
                *dst = *src;
            }
            Ok(())
        } else {
            Err(SourceError::ReadFailed {
                name: "ai".to_string(),
                reason: "bus timeout".to_string(),
            })
        }
    });
    source
}

#[test]
fn test_capture_read_failure_leaves_state_unchanged() {
    let bus = MockBus::new();
    let latch = bus.add_source(SourceInfo::new("latch", DataType::U64, 1));
    let next = bus.add_source(SourceInfo::new("next", DataType::U64, 1));
    let data = failing_source(SourceInfo::new("ai", DataType::U16, 4), 2, vec![7, 0]);
    let registry = MixedRegistry::new(bus).with_mock("ai", data);

    let config = CaptureConfig {
        source: "ai".to_string(),
        trigger: "latch".to_string(),
        next_time: "next".to_string(),
        window_elements: 8,
        ..CaptureConfig::default()
    };
    let mut engine = CaptureEngine::new(
        0,
        config,
        HostTiming::new(1000.0),
        Arc::new(ParameterStore::new()),
    )
    .unwrap();
    engine.bind(&registry).unwrap();

    latch.write_counter(1).unwrap();
    next.write_counter(1_000_000).unwrap();
    engine.execute(true).unwrap();

    latch.write_counter(1_500_000).unwrap();
    next.write_counter(2_000_000).unwrap();
    engine.execute(true).unwrap();
    assert_eq!(engine.state(), CaptureState::Collecting);
    let fill = engine.fill_offset();
    let window = engine.window().to_vec();
    assert_eq!(fill, 2 * 2);

    next.write_counter(3_000_000).unwrap();
    let err = engine.execute(true).unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Source(SourceError::ReadFailed { .. })
    ));
    assert_eq!(engine.state(), CaptureState::Collecting);
    assert_eq!(engine.fill_offset(), fill);
    assert_eq!(engine.window(), &window[..]);
    assert_eq!(engine.trigger_count(), 1);
    assert_eq!(engine.next_sample_time(), 2_000_000);
}

#[test]
fn test_analysis_read_failure_keeps_window() {
    let data = failing_source(
        SourceInfo::new("ai", DataType::F64, 1),
        1,
        1.0f64.to_le_bytes().to_vec(),
    );
    let registry = MixedRegistry::new(MockBus::new()).with_mock("ai", data);

    let config = AnalysisConfig {
        source: "ai".to_string(),
        nfft: 4,
        enable: true,
        mode: AcquisitionMode::Continuous,
        ..AnalysisConfig::default()
    };
    let mut analyzer = SpectrumAnalyzer::new(
        0,
        config,
        HostTiming::new(1000.0),
        Arc::new(ParameterStore::new()),
    )
    .unwrap();
    analyzer.bind(&registry).unwrap();

    analyzer.execute(true).unwrap();
    assert_eq!(analyzer.fill_level(), Some(1));

    let err = analyzer.execute(true).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Source(SourceError::ReadFailed { .. })
    ));
    assert_eq!(analyzer.fill_level(), Some(1));
}

#[test]
fn test_unsupported_data_type_is_rejected_at_bind() {
    let mut source = MockSource::new();
    source
        .expect_info()
        .return_const(SourceInfo::new("bits", DataType::B1, 8));
    source.expect_read().never();
    let registry = MixedRegistry::new(MockBus::new()).with_mock("bits", source);

    let config = AnalysisConfig {
        source: "bits".to_string(),
        nfft: 8,
        ..AnalysisConfig::default()
    };
    let mut analyzer = SpectrumAnalyzer::new(
        0,
        config,
        HostTiming::new(1000.0),
        Arc::new(ParameterStore::new()),
    )
    .unwrap();
    assert!(matches!(
        analyzer.bind(&registry),
        Err(AnalysisError::Source(SourceError::UnsupportedDataType { .. }))
    ));
    assert!(!analyzer.is_bound());
}
