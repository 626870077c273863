// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated process image
//!
//! [`SimulatedBus`] drives a [`MockBus`] from a [`SimulationConfig`]: on
//! every call to [`SimulatedBus::advance`] each signal receives one tick of
//! samples and the timestamp of the next tick's first sample, and each
//! trigger latches a jittered timestamp once every `period_cycles` ticks.
//! Counters are truncated to their source width, so a 32-bit timestamp
//! wraps after about 4.3 s of simulated time.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::mock::{MockBus, MockHandle};
use super::{HostTiming, SourceError, SourceInfo};
use crate::config::{HostConfig, SimulationConfig, TriggerConfig};
use crate::utility::signal_generator::SignalGenerator;

struct SimulatedSignal {
    name: String,
    samples: MockHandle,
    next_time: MockHandle,
    generator: SignalGenerator,
    block: Vec<f64>,
}

struct SimulatedTrigger {
    config: TriggerConfig,
    latch: MockHandle,
}

/// Simulated host process image advanced once per tick.
pub struct SimulatedBus {
    bus: MockBus,
    signals: Vec<SimulatedSignal>,
    triggers: Vec<SimulatedTrigger>,
    period_ns: u64,
    clock_ns: u64,
    cycle: u64,
    startup_cycles: u64,
    rng: StdRng,
}

fn require_counter(name: &str, info: &SourceInfo) -> Result<(), SourceError> {
    if info.data_type.is_float() {
        return Err(SourceError::UnsupportedDataType {
            name: name.to_string(),
            data_type: info.data_type,
        });
    }
    Ok(())
}

impl SimulatedBus {
    /// Declare every simulated source on a fresh [`MockBus`].
    pub fn new(simulation: &SimulationConfig, host: &HostConfig) -> Result<Self, SourceError> {
        let timing: HostTiming = host.timing();
        let period_ns = timing.period_ns().max(1) as u64;
        let bus = MockBus::new();
        let mut seeds = match simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut signals = Vec::with_capacity(simulation.signals.len());
        for config in &simulation.signals {
            if !config.data_type.is_numeric() {
                return Err(SourceError::UnsupportedDataType {
                    name: config.name.clone(),
                    data_type: config.data_type,
                });
            }
            if config.elements_per_cycle == 0 {
                return Err(SourceError::Empty {
                    name: config.name.clone(),
                });
            }
            let next_name = config.next_time_name();
            let next_info = SourceInfo::new(next_name.clone(), config.timestamp_type, 1);
            require_counter(&next_name, &next_info)?;

            let samples = bus.add_source(SourceInfo::new(
                config.name.clone(),
                config.data_type,
                config.elements_per_cycle,
            ));
            let next_time = bus.add_source(next_info);
            let generator = SignalGenerator::new(
                config.waveform,
                config.frequency_hz,
                host.tick_rate_hz * config.elements_per_cycle as f64,
                config.amplitude,
                config.offset,
                config.noise_amplitude,
                Some(seeds.random()),
            );
            signals.push(SimulatedSignal {
                name: config.name.clone(),
                samples,
                next_time,
                generator,
                block: vec![0.0; config.elements_per_cycle],
            });
        }

        let mut triggers = Vec::with_capacity(simulation.triggers.len());
        for config in &simulation.triggers {
            let info = SourceInfo::new(config.name.clone(), config.timestamp_type, 1);
            require_counter(&config.name, &info)?;
            if config.period_cycles == 0 {
                warn!("Simulated trigger '{}' has a zero period and never fires", config.name);
            }
            let latch = bus.add_source(info);
            triggers.push(SimulatedTrigger {
                config: config.clone(),
                latch,
            });
        }

        debug!(
            "Simulated bus ready: {} signals, {} triggers, tick {} ns",
            signals.len(),
            triggers.len(),
            period_ns
        );

        let mut simulated = Self {
            bus,
            signals,
            triggers,
            period_ns,
            clock_ns: simulation.start_time_ns,
            cycle: 0,
            startup_cycles: host.startup_cycles,
            rng: StdRng::seed_from_u64(seeds.random()),
        };
        // Latches hold the start time until their first event
        let start = simulated.clock_ns;
        for trigger in &simulated.triggers {
            if let Err(e) = trigger.latch.write_counter(start) {
                warn!("Cannot initialise latch '{}': {}", trigger.config.name, e);
            }
        }
        simulated.publish_next_times();
        Ok(simulated)
    }

    /// Registry to bind channels against
    pub fn registry(&self) -> &MockBus {
        &self.bus
    }

    /// Number of ticks simulated so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Current value of the simulated clock in ns
    pub fn clock_ns(&self) -> u64 {
        self.clock_ns
    }

    /// The bus reports operational once the start-up delay has elapsed.
    pub fn is_operational(&self) -> bool {
        self.cycle > self.startup_cycles
    }

    fn publish_next_times(&self) {
        let next = self.clock_ns.wrapping_add(self.period_ns);
        for signal in &self.signals {
            if let Err(e) = signal.next_time.write_counter(next) {
                warn!("Cannot write next time of '{}': {}", signal.name, e);
            }
        }
    }

    /// Produce one tick of data.
    ///
    /// The samples written cover `[clock, clock + period)`; the next-time
    /// sources then hold `clock + period`. Trigger events latch a uniformly
    /// drawn time inside the tick.
    pub fn advance(&mut self) {
        for signal in self.signals.iter_mut() {
            signal.generator.fill(&mut signal.block);
            if let Err(e) = signal.samples.write_values(&signal.block) {
                warn!("Cannot write samples of '{}': {}", signal.name, e);
            }
        }
        self.publish_next_times();

        for trigger in &self.triggers {
            let period = trigger.config.period_cycles;
            if period == 0 || self.cycle % period != 0 {
                continue;
            }
            let offset = self.rng.random_range(0..self.period_ns);
            let latched = self.clock_ns.wrapping_add(offset);
            debug!(
                "Trigger '{}' latched at {} ns (cycle {})",
                trigger.config.name, latched, self.cycle
            );
            if let Err(e) = trigger.latch.write_counter(latched) {
                warn!("Cannot write latch '{}': {}", trigger.config.name, e);
            }
        }

        self.clock_ns = self.clock_ns.wrapping_add(self.period_ns);
        self.cycle += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::decoder::{decode_counter, decode_iter};
    use crate::acquisition::{DataType, SampleSource, SourceRegistry};
    use crate::config::SignalConfig;
    use crate::utility::Waveform;

    fn ramp_config() -> SimulationConfig {
        SimulationConfig {
            start_time_ns: 1_000,
            seed: Some(5),
            signals: vec![SignalConfig {
                name: "ai".to_string(),
                data_type: DataType::S32,
                elements_per_cycle: 4,
                waveform: Waveform::Ramp,
                amplitude: 1.0,
                offset: 0.0,
                noise_amplitude: 0.0,
                ..SignalConfig::default()
            }],
            triggers: vec![TriggerConfig {
                name: "latch".to_string(),
                period_cycles: 2,
                timestamp_type: DataType::U32,
            }],
        }
    }

    fn read_counter(source: &dyn SampleSource) -> u64 {
        let mut buf = vec![0u8; source.info().byte_size()];
        source.read(&mut buf).unwrap();
        decode_counter(source.info().data_type, &buf).unwrap()
    }

    #[test]
    fn test_advance_writes_samples_and_next_time() {
        let host = HostConfig {
            startup_cycles: 1,
            ..HostConfig::default()
        };
        let mut sim = SimulatedBus::new(&ramp_config(), &host).unwrap();
        let samples = sim.registry().bind("ai").unwrap();
        let next = sim.registry().bind("ai.nexttime").unwrap();
        assert_eq!(read_counter(next.as_ref()), 1_001_000);
        assert!(!sim.is_operational());

        sim.advance();
        sim.advance();
        let mut buf = vec![0u8; samples.info().byte_size()];
        samples.read(&mut buf).unwrap();
        let values: Vec<f64> = decode_iter(DataType::S32, &buf).unwrap().collect();
        assert_eq!(values, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(read_counter(next.as_ref()), 2_001_000);
        assert_eq!(sim.cycle(), 2);
        assert!(sim.is_operational());
    }

    #[test]
    fn test_trigger_latches_around_clock() {
        let mut sim = SimulatedBus::new(&ramp_config(), &HostConfig::default()).unwrap();
        let latch = sim.registry().bind("latch").unwrap();
        for _ in 0..4 {
            let clock = sim.clock_ns();
            let cycle = sim.cycle();
            sim.advance();
            if cycle % 2 == 0 {
                let value = read_counter(latch.as_ref());
                assert!(value >= clock);
                assert!(value < clock + 1_000_000);
            }
        }
    }

    #[test]
    fn test_float_timestamp_is_rejected() {
        let mut config = ramp_config();
        config.triggers[0].timestamp_type = DataType::F64;
        assert!(matches!(
            SimulatedBus::new(&config, &HostConfig::default()),
            Err(SourceError::UnsupportedDataType { .. })
        ));
    }
}
