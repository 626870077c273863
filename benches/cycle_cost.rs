// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-tick cost of the real-time side
//!
//! Run with:
//!
//! ```bash
//! cargo bench --bench cycle_cost
//! ```
//!
//! Measures:
//! - assembly of one capture window, trigger to publish
//! - one analyzer batch (decode and store)
//! - one compute pass on the worker side

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use rust_rtscope::acquisition::decoder::decode_into;
use rust_rtscope::acquisition::{DataType, HostTiming, MockBus, SourceInfo};
use rust_rtscope::capture::CaptureEngine;
use rust_rtscope::config::{AcquisitionMode, AnalysisConfig, CaptureConfig};
use rust_rtscope::pipeline::{compute_pass, AnalysisBuffers, ComputeOptions, SpectrumAnalyzer};
use rust_rtscope::publish::LogPublisher;
use rust_rtscope::spectral::RustFftTransform;

const TICK_NS: u64 = 1_000_000;

fn bench_capture_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle/capture");

    for elements in [10usize, 100, 1000] {
        let bus = MockBus::new();
        let data = bus.add_source(SourceInfo::new("ai", DataType::S16, elements));
        let latch = bus.add_source(SourceInfo::new("latch", DataType::U64, 1));
        let next = bus.add_source(SourceInfo::new("next", DataType::U64, 1));
        let values: Vec<f64> = (0..elements).map(|i| i as f64).collect();
        data.write_values(&values).unwrap();

        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "latch".to_string(),
            next_time: "next".to_string(),
            window_elements: 4 * elements,
            ..CaptureConfig::default()
        };
        let mut engine =
            CaptureEngine::new(0, config, HostTiming::new(1000.0), Arc::new(LogPublisher)).unwrap();
        engine.bind(&bus).unwrap();

        // Absorb the power-up latch change
        latch.write_counter(1).unwrap();
        next.write_counter(TICK_NS).unwrap();
        engine.execute(true).unwrap();

        let mut clock = TICK_NS;
        group.bench_function(BenchmarkId::new("window", elements), |b| {
            b.iter(|| {
                // Trigger half a tick back, then collect until the window is published
                clock += 8 * TICK_NS;
                latch.write_counter(clock + TICK_NS / 2).unwrap();
                for k in 1..=5 {
                    next.write_counter(clock + k * TICK_NS).unwrap();
                    engine.execute(black_box(true)).unwrap();
                }
            })
        });
    }
    group.finish();
}

fn bench_analysis_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle/analysis");

    for elements in [10usize, 100, 1000] {
        let bus = MockBus::new();
        let data = bus.add_source(SourceInfo::new("ai", DataType::S32, elements));
        let values: Vec<f64> = (0..elements).map(|i| (i % 97) as f64).collect();
        data.write_values(&values).unwrap();

        let config = AnalysisConfig {
            source: "ai".to_string(),
            nfft: 4096,
            enable: true,
            mode: AcquisitionMode::Continuous,
            ..AnalysisConfig::default()
        };
        let mut analyzer =
            SpectrumAnalyzer::new(0, config, HostTiming::new(1000.0), Arc::new(LogPublisher))
                .unwrap();
        analyzer.bind(&bus).unwrap();

        group.bench_function(BenchmarkId::new("execute", elements), |b| {
            b.iter(|| black_box(analyzer.execute(true).unwrap()))
        });

        let bytes = data.snapshot();
        let mut out = vec![0.0; elements];
        group.bench_function(BenchmarkId::new("decode", elements), |b| {
            b.iter(|| decode_into(DataType::S32, black_box(&bytes), &mut out).unwrap())
        });
    }
    group.finish();
}

fn bench_compute_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker/compute");
    let options = ComputeOptions {
        remove_mean: true,
        remove_linear: true,
        apply_scale: true,
    };

    for nfft in [1024usize, 4096, 16384] {
        let mut transform = RustFftTransform::new(nfft);
        let mut buffers = AnalysisBuffers::new(nfft);
        for i in 0..nfft {
            buffers.push((i as f64 * 0.1).sin() + 0.001 * i as f64);
        }
        let snapshot = buffers.preprocessed.clone();

        group.bench_function(BenchmarkId::new("pass", nfft), |b| {
            b.iter(|| {
                buffers.preprocessed.copy_from_slice(&snapshot);
                compute_pass(&options, &mut transform, black_box(&mut buffers)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_capture_tick,
    bench_analysis_batch,
    bench_compute_pass
);
criterion_main!(benches);
