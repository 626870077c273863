// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Trigger-aligned capture engine
//!
//! Each tick the engine reads three bound sources: the sample data (`E`
//! elements per tick), the trigger latch timestamp and the timestamp of the
//! first sample of the next tick. From the two timestamps it derives how many
//! samples ago the trigger happened and assembles a result window whose first
//! element is the sample coincident with the trigger, using the retained
//! previous tick when the trigger fell there.
//!
//! ```text
//!   previous tick         current tick          next tick
//! |p0 p1 .. p(E-1)|c0 c1 .. c(E-1)|n0
//!            ^ trigger                  ^ next sample time
//!            <---- samples since trigger ---->
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use super::timestamp::{time_diff, CounterWidth};
use super::{CaptureError, CaptureState};
use crate::acquisition::decoder::{decode_counter, format_elements};
use crate::acquisition::{HostTiming, SampleSource, SourceError, SourceRegistry};
use crate::config::CaptureConfig;
use crate::publish::{BufferId, ParamKey, ParamValue, ResultPublisher};

struct CaptureBindings {
    data: Box<dyn SampleSource>,
    trigger: Box<dyn SampleSource>,
    next_time: Box<dyn SampleSource>,
    /// Elements delivered per tick
    elements_per_cycle: usize,
    element_size: usize,
    sample_period_ns: i64,
    counter_width: CounterWidth,
    trigger_buf: Vec<u8>,
    next_time_buf: Vec<u8>,
}

/// Trigger-aligned capture of one data source.
pub struct CaptureEngine {
    index: usize,
    config: CaptureConfig,
    timing: HostTiming,
    publisher: Arc<dyn ResultPublisher>,
    bindings: Option<CaptureBindings>,
    state: CaptureState,
    enabled: bool,

    window: Vec<u8>,
    fill: usize,
    previous_scan: Vec<u8>,
    current_scan: Vec<u8>,
    /// The previous scan holds the tick right before the current one
    previous_valid: bool,

    last_trigger: u64,
    first_trigger: bool,
    next_sample_time: u64,
    samples_since_trigger: i64,
    missed_triggers: u64,
    trigger_count: u64,
}

impl CaptureEngine {
    /// Create an unbound engine.
    ///
    /// ### Errors
    ///
    /// Returns [`CaptureError::InvalidConfig`] for an empty window or a
    /// missing source, trigger or next-time identifier, and when the host
    /// tick period is not positive.
    pub fn new(
        index: usize,
        config: CaptureConfig,
        timing: HostTiming,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        if timing.period_ns() <= 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "invalid host tick rate {} Hz",
                timing.tick_rate_hz
            )));
        }
        let enabled = config.enable;
        debug!(
            "scope{}: created for source '{}' (trigger '{}', next time '{}', {} elements)",
            index, config.source, config.trigger, config.next_time, config.window_elements
        );
        Ok(Self {
            index,
            config,
            timing,
            publisher,
            bindings: None,
            state: CaptureState::Invalid,
            enabled,
            window: Vec::new(),
            fill: 0,
            previous_scan: Vec::new(),
            current_scan: Vec::new(),
            previous_valid: false,
            last_trigger: 0,
            first_trigger: true,
            next_sample_time: 0,
            samples_since_trigger: 0,
            missed_triggers: 0,
            trigger_count: 0,
        })
    }

    fn key(&self, buffer: BufferId) -> ParamKey {
        ParamKey::scope(self.index, buffer)
    }

    /// Resolve the three sources and allocate the buffers.
    ///
    /// Binding twice is a no-op. On failure the engine stays
    /// [`CaptureState::Invalid`].
    pub fn bind(&mut self, registry: &dyn SourceRegistry) -> Result<(), CaptureError> {
        if self.bindings.is_some() {
            return Ok(());
        }

        let data = registry.bind(&self.config.source)?;
        let trigger = registry.bind(&self.config.trigger)?;
        let next_time = registry.bind(&self.config.next_time)?;

        let data_info = data.info().clone();
        if !data_info.data_type.is_numeric() {
            return Err(SourceError::UnsupportedDataType {
                name: data_info.name,
                data_type: data_info.data_type,
            }
            .into());
        }
        if data_info.element_count == 0 {
            return Err(SourceError::Empty {
                name: data_info.name,
            }
            .into());
        }
        for timestamp in [&trigger, &next_time] {
            let info = timestamp.info();
            let counter = info.data_type.is_numeric() && !info.data_type.is_float();
            if !counter || info.element_count == 0 {
                return Err(SourceError::UnsupportedDataType {
                    name: info.name.clone(),
                    data_type: info.data_type,
                }
                .into());
            }
        }

        let elements_per_cycle = data_info.element_count;
        let sample_period_ns = self.timing.period_ns() / elements_per_cycle as i64;
        if sample_period_ns <= 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "{} elements per tick is finer than 1 ns at {} Hz",
                elements_per_cycle, self.timing.tick_rate_hz
            )));
        }

        let mut bindings = CaptureBindings {
            elements_per_cycle,
            element_size: data_info.element_size(),
            sample_period_ns,
            counter_width: CounterWidth::for_sources(
                trigger.info().data_type,
                next_time.info().data_type,
            ),
            trigger_buf: vec![0u8; trigger.info().byte_size()],
            next_time_buf: vec![0u8; next_time.info().byte_size()],
            data,
            trigger,
            next_time,
        };

        // Start from the current latch so a stale trigger is not replayed
        self.last_trigger = read_counter(&*bindings.trigger, &mut bindings.trigger_buf)?;

        self.window = vec![0u8; self.config.window_elements * bindings.element_size];
        self.previous_scan = vec![0u8; data_info.byte_size()];
        self.current_scan = vec![0u8; data_info.byte_size()];
        self.previous_valid = false;
        self.fill = 0;
        self.first_trigger = true;
        self.state = CaptureState::WaitTrigger;

        info!(
            "scope{}: bound '{}' ({} x {}, sample period {} ns, {}-bit timestamps)",
            self.index,
            data_info.name,
            elements_per_cycle,
            data_info.data_type,
            sample_period_ns,
            bindings.counter_width.bits()
        );
        self.bindings = Some(bindings);

        self.publisher.publish(
            self.key(BufferId::Source),
            ParamValue::Text(&self.config.source),
        );
        self.publisher.publish(
            self.key(BufferId::TriggerSource),
            ParamValue::Text(&self.config.trigger),
        );
        self.publisher.publish(
            self.key(BufferId::NextTimeSource),
            ParamValue::Text(&self.config.next_time),
        );
        self.publisher
            .publish(self.key(BufferId::Enable), ParamValue::Flag(self.enabled));
        Ok(())
    }

    /// Run one tick.
    ///
    /// All sources are read before any state changes, so a read failure
    /// leaves the engine exactly as it was.
    pub fn execute(&mut self, bus_operational: bool) -> Result<(), CaptureError> {
        if self.bindings.is_none() {
            return Err(CaptureError::NotBound(self.config.source.clone()));
        }

        if !bus_operational {
            self.reset_window();
            self.previous_valid = false;
            self.state = CaptureState::WaitTrigger;
            return Ok(());
        }

        let trigger = self.read_trigger()?;

        if !self.enabled {
            // Absorb triggers while disabled
            self.reset_window();
            self.previous_valid = false;
            self.state = CaptureState::WaitTrigger;
            self.last_trigger = trigger;
            return Ok(());
        }

        let next = self.read_scan()?;
        self.next_sample_time = next;

        match self.state {
            CaptureState::Invalid => {
                self.state = CaptureState::WaitTrigger;
                self.last_trigger = trigger;
            }
            CaptureState::WaitTrigger => self.wait_for_trigger(trigger, next),
            CaptureState::Collecting => {
                if trigger != self.last_trigger {
                    self.missed_triggers += 1;
                    warn!(
                        "scope{}: new trigger before window was full ({} of {} bytes), restarting",
                        self.index,
                        self.fill,
                        self.window.len()
                    );
                    self.publisher.publish(
                        self.key(BufferId::MissedTriggers),
                        ParamValue::Integer(self.missed_triggers as i64),
                    );
                    self.reset_window();
                    self.state = CaptureState::WaitTrigger;
                    self.wait_for_trigger(trigger, next);
                } else {
                    let len = self.current_scan.len();
                    self.append_current(0, len);
                    if self.is_full() {
                        self.finish_window();
                    }
                }
            }
        }

        std::mem::swap(&mut self.previous_scan, &mut self.current_scan);
        self.previous_valid = true;
        Ok(())
    }

    fn read_trigger(&mut self) -> Result<u64, CaptureError> {
        match self.bindings.as_mut() {
            Some(b) => read_counter(&*b.trigger, &mut b.trigger_buf),
            None => Err(CaptureError::NotBound(self.config.source.clone())),
        }
    }

    /// Read the next sample time and this tick's data into the current scan.
    fn read_scan(&mut self) -> Result<u64, CaptureError> {
        let Some(b) = self.bindings.as_mut() else {
            return Err(CaptureError::NotBound(self.config.source.clone()));
        };
        let next = read_counter(&*b.next_time, &mut b.next_time_buf)?;
        b.data.read(&mut self.current_scan)?;
        Ok(next)
    }

    fn wait_for_trigger(&mut self, trigger: u64, next: u64) {
        if trigger == self.last_trigger {
            return;
        }
        if self.first_trigger {
            // The first change is usually the latch leaving its power-up value
            self.first_trigger = false;
            self.last_trigger = trigger;
            return;
        }
        let Some(bindings) = self.bindings.as_ref() else {
            return;
        };
        let elements = bindings.elements_per_cycle as i64;
        let element_size = bindings.element_size;

        let delta = time_diff(trigger, next, bindings.counter_width);
        if delta.wrapped {
            debug!(
                "scope{}: timestamp counter wrapped (trigger {}, next {}, diff {} ns)",
                self.index, trigger, next, delta.nanos
            );
        }
        let samples = delta.nanos / bindings.sample_period_ns;
        self.samples_since_trigger = samples;
        self.publisher.publish(
            self.key(BufferId::SamplesToTrigger),
            ParamValue::Integer(samples),
        );

        if samples > 2 * elements {
            warn!(
                "scope{}: trigger {} samples old, older than two ticks ({} samples), dropped",
                self.index,
                samples,
                2 * elements
            );
            self.miss_trigger(trigger);
            return;
        }
        if samples > elements && !self.previous_valid {
            warn!(
                "scope{}: trigger {} samples old but the previous tick was not captured, dropped",
                self.index, samples
            );
            self.miss_trigger(trigger);
            return;
        }

        if samples < 0 {
            debug!(
                "scope{}: trigger {} samples ahead of next sample time, deferred",
                self.index, -samples
            );
            return;
        }

        self.last_trigger = trigger;
        self.trigger_count += 1;
        self.publisher.publish(
            self.key(BufferId::TriggerCount),
            ParamValue::Integer(self.trigger_count as i64),
        );

        self.reset_window();
        let samples = samples as usize;
        let elements = elements as usize;
        if samples > elements {
            let start = (2 * elements - samples) * element_size;
            self.copy_into_window(Source::Previous, start, self.previous_scan.len());
        }
        let start = elements.saturating_sub(samples) * element_size;
        let len = self.current_scan.len();
        self.append_current(start, len);

        if self.is_full() {
            self.finish_window();
        } else {
            self.state = CaptureState::Collecting;
        }
    }

    fn miss_trigger(&mut self, trigger: u64) {
        self.missed_triggers += 1;
        self.last_trigger = trigger;
        self.publisher.publish(
            self.key(BufferId::MissedTriggers),
            ParamValue::Integer(self.missed_triggers as i64),
        );
    }

    fn append_current(&mut self, start: usize, end: usize) {
        self.copy_into_window(Source::Current, start, end);
    }

    fn copy_into_window(&mut self, source: Source, start: usize, end: usize) {
        let scan = match source {
            Source::Previous => &self.previous_scan,
            Source::Current => &self.current_scan,
        };
        let available = end.saturating_sub(start);
        let len = available.min(self.window.len() - self.fill);
        if len == 0 {
            return;
        }
        self.window[self.fill..self.fill + len].copy_from_slice(&scan[start..start + len]);
        self.fill += len;
    }

    fn is_full(&self) -> bool {
        self.fill >= self.window.len()
    }

    fn finish_window(&mut self) {
        let data_type = match self.bindings.as_ref() {
            Some(bindings) => bindings.data.info().data_type,
            None => return,
        };
        if self.config.debug {
            match format_elements(data_type, &self.window) {
                Ok(text) => info!("scope{}: window {}", self.index, text),
                Err(e) => warn!("scope{}: cannot format window: {}", self.index, e),
            }
        }
        self.publisher.publish(
            self.key(BufferId::ResultData),
            ParamValue::Samples {
                data_type,
                bytes: &self.window,
            },
        );
        self.fill = 0;
        self.state = CaptureState::WaitTrigger;
    }

    fn reset_window(&mut self) {
        self.window.fill(0);
        self.fill = 0;
    }

    /// Enable or disable the channel. Either way the partial window is discarded.
    pub fn set_enable(&mut self, enable: bool) {
        if enable != self.enabled {
            info!(
                "scope{}: {}",
                self.index,
                if enable { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enable;
        self.clear();
        self.publisher
            .publish(self.key(BufferId::Enable), ParamValue::Flag(enable));
    }

    /// Force-trigger command: restart the capture from scratch.
    pub fn trigger(&mut self) {
        debug!("scope{}: trigger command", self.index);
        self.clear();
    }

    /// Discard the partial window and wait for the next trigger.
    pub fn clear(&mut self) {
        self.reset_window();
        self.previous_valid = false;
        if self.bindings.is_some() {
            self.state = CaptureState::WaitTrigger;
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.bindings.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn missed_triggers(&self) -> u64 {
        self.missed_triggers
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    /// Last computed distance between trigger and next sample, in samples
    pub fn samples_since_trigger(&self) -> i64 {
        self.samples_since_trigger
    }

    pub fn next_sample_time(&self) -> u64 {
        self.next_sample_time
    }

    /// Bytes already written to the window
    pub fn fill_offset(&self) -> usize {
        self.fill
    }

    pub fn window(&self) -> &[u8] {
        &self.window
    }
}

#[derive(Clone, Copy)]
enum Source {
    Previous,
    Current,
}

fn read_counter(source: &dyn SampleSource, buf: &mut [u8]) -> Result<u64, CaptureError> {
    source.read(buf)?;
    let data_type = source.info().data_type;
    decode_counter(data_type, buf).map_err(|e| {
        CaptureError::Source(SourceError::ReadFailed {
            name: source.info().name.clone(),
            reason: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{DataType, MockBus, SourceInfo};
    use crate::acquisition::mock::MockHandle;
    use crate::publish::ParameterStore;

    const TICK_NS: u64 = 1_000_000;

    struct Rig {
        engine: CaptureEngine,
        store: Arc<ParameterStore>,
        data: MockHandle,
        trigger: MockHandle,
        next: MockHandle,
    }

    fn rig(elements: usize, window: usize) -> Rig {
        let bus = MockBus::new();
        let data = bus.add_source(SourceInfo::new("ai", DataType::U16, elements));
        let trigger = bus.add_source(SourceInfo::new("latch", DataType::U64, 1));
        let next = bus.add_source(SourceInfo::new("next", DataType::U64, 1));
        let store = Arc::new(ParameterStore::new());
        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "latch".to_string(),
            next_time: "next".to_string(),
            window_elements: window,
            ..CaptureConfig::default()
        };
        let mut engine =
            CaptureEngine::new(0, config, HostTiming::new(1000.0), store.clone()).unwrap();
        engine.bind(&bus).unwrap();
        Rig {
            engine,
            store,
            data,
            trigger,
            next,
        }
    }

    impl Rig {
        /// Tick `cycle`: data counts up from `cycle * E`, next time is the start of the following tick
        fn tick(&mut self, cycle: u64) {
            let elements = self.data.info().element_count as u64;
            let values: Vec<f64> = (0..elements).map(|i| (cycle * elements + i) as f64).collect();
            self.data.write_values(&values).unwrap();
            self.next.write_counter((cycle + 1) * TICK_NS).unwrap();
            self.engine.execute(true).unwrap();
        }
    }

    #[test]
    fn test_new_rejects_empty_window() {
        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "latch".to_string(),
            next_time: "next".to_string(),
            window_elements: 0,
            ..CaptureConfig::default()
        };
        let result = CaptureEngine::new(
            0,
            config,
            HostTiming::default(),
            Arc::new(ParameterStore::new()),
        );
        assert!(matches!(result, Err(CaptureError::InvalidConfig(_))));
    }

    #[test]
    fn test_execute_before_bind_fails() {
        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "latch".to_string(),
            next_time: "next".to_string(),
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(
            0,
            config,
            HostTiming::default(),
            Arc::new(ParameterStore::new()),
        )
        .unwrap();
        assert_eq!(engine.state(), CaptureState::Invalid);
        assert!(matches!(engine.execute(true), Err(CaptureError::NotBound(_))));
    }

    #[test]
    fn test_bind_unknown_source_stays_invalid() {
        let bus = MockBus::new();
        bus.add_source(SourceInfo::new("ai", DataType::U16, 4));
        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "missing".to_string(),
            next_time: "next".to_string(),
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(
            0,
            config,
            HostTiming::default(),
            Arc::new(ParameterStore::new()),
        )
        .unwrap();
        assert!(matches!(
            engine.bind(&bus),
            Err(CaptureError::Source(SourceError::NotFound(_)))
        ));
        assert_eq!(engine.state(), CaptureState::Invalid);
    }

    #[test]
    fn test_bind_rejects_bit_latch() {
        let bus = MockBus::new();
        bus.add_source(SourceInfo::new("ai", DataType::U16, 4));
        bus.add_source(SourceInfo::new("latch", DataType::B4, 1));
        bus.add_source(SourceInfo::new("next", DataType::U64, 1));
        let config = CaptureConfig {
            source: "ai".to_string(),
            trigger: "latch".to_string(),
            next_time: "next".to_string(),
            ..CaptureConfig::default()
        };
        let mut engine = CaptureEngine::new(
            0,
            config,
            HostTiming::default(),
            Arc::new(ParameterStore::new()),
        )
        .unwrap();
        assert!(matches!(
            engine.bind(&bus),
            Err(CaptureError::Source(SourceError::UnsupportedDataType {
                data_type: DataType::B4,
                ..
            }))
        ));
        assert!(!engine.is_bound());
        assert_eq!(engine.state(), CaptureState::Invalid);
    }

    #[test]
    fn test_first_trigger_is_suppressed() {
        let mut rig = rig(4, 8);
        rig.tick(0);
        rig.trigger.write_counter(TICK_NS + 500_000).unwrap();
        rig.tick(1);
        assert_eq!(rig.engine.trigger_count(), 0);
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
    }

    #[test]
    fn test_trigger_exactly_one_tick_back_uses_current_buffer() {
        let mut rig = rig(4, 4);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0); // absorbs the first change
        // Trigger at the start of tick 2: exactly E samples before the next sample time
        rig.trigger.write_counter(2 * TICK_NS).unwrap();
        rig.tick(2);
        assert_eq!(rig.engine.samples_since_trigger(), 4);
        let key = ParamKey::scope(0, BufferId::ResultData);
        assert_eq!(rig.store.reals(key), Some(vec![8.0, 9.0, 10.0, 11.0]));
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
        assert_eq!(rig.engine.fill_offset(), 0);
    }

    #[test]
    fn test_trigger_at_next_sample_time_starts_empty() {
        let mut rig = rig(4, 6);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(2 * TICK_NS).unwrap();
        rig.tick(1);
        assert_eq!(rig.engine.samples_since_trigger(), 0);
        assert_eq!(rig.engine.state(), CaptureState::Collecting);
        assert_eq!(rig.engine.fill_offset(), 0);
        rig.tick(2);
        rig.tick(3);
        let key = ParamKey::scope(0, BufferId::ResultData);
        assert_eq!(
            rig.store.reals(key),
            Some(vec![8.0, 9.0, 10.0, 11.0, 12.0, 13.0])
        );
    }

    #[test]
    fn test_stale_trigger_is_dropped() {
        let mut rig = rig(4, 8);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.tick(1);
        // Trigger latched during tick 1 but only observed in tick 4
        rig.trigger.write_counter(TICK_NS + 250_000).unwrap();
        let before = rig.engine.window().to_vec();
        rig.tick(4);
        assert_eq!(rig.engine.missed_triggers(), 1);
        assert_eq!(rig.engine.trigger_count(), 0);
        assert_eq!(rig.engine.window(), &before[..]);
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
        assert_eq!(
            rig.store.integer(ParamKey::scope(0, BufferId::MissedTriggers)),
            Some(1)
        );
    }

    #[test]
    fn test_future_trigger_is_deferred() {
        let mut rig = rig(4, 4);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(5 * TICK_NS).unwrap();
        rig.tick(1);
        assert_eq!(rig.engine.trigger_count(), 0);
        assert_eq!(rig.engine.missed_triggers(), 0);
        assert!(rig.engine.samples_since_trigger() < 0);
        // Same latch, now in the past: accepted on retry
        rig.tick(4);
        assert_eq!(rig.engine.trigger_count(), 1);
        assert_eq!(rig.engine.samples_since_trigger(), 0);
    }

    #[test]
    fn test_new_trigger_while_collecting_restarts() {
        let mut rig = rig(4, 12);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(TICK_NS + 500_000).unwrap();
        rig.tick(1);
        assert_eq!(rig.engine.state(), CaptureState::Collecting);
        rig.trigger.write_counter(2 * TICK_NS + 250_000).unwrap();
        rig.tick(2);
        assert_eq!(rig.engine.missed_triggers(), 1);
        assert_eq!(rig.engine.trigger_count(), 2);
        assert_eq!(rig.engine.state(), CaptureState::Collecting);
        // Re-armed on the new trigger: sample 9 is the first one
        assert_eq!(rig.engine.fill_offset(), 3 * 2);
        assert_eq!(&rig.engine.window()[..2], &9u16.to_le_bytes());
    }

    #[test]
    fn test_disable_discards_partial_window() {
        let mut rig = rig(4, 12);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(TICK_NS + 500_000).unwrap();
        rig.tick(1);
        assert!(rig.engine.fill_offset() > 0);

        rig.engine.set_enable(false);
        rig.trigger.write_counter(3 * TICK_NS).unwrap();
        rig.tick(2);
        assert_eq!(rig.engine.fill_offset(), 0);
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);

        // The trigger seen while disabled is not replayed
        rig.engine.set_enable(true);
        rig.tick(3);
        assert_eq!(rig.engine.trigger_count(), 1);
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
    }

    #[test]
    fn test_trigger_in_tick_skipped_while_disabled_is_missed() {
        let mut rig = rig(4, 8);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.tick(1);
        rig.engine.set_enable(false);
        rig.tick(2);
        rig.engine.set_enable(true);

        // Sample 9 lies in tick 2, whose data was never read
        rig.trigger.write_counter(2 * TICK_NS + 250_000).unwrap();
        rig.tick(3);
        rig.tick(4);
        assert_eq!(rig.engine.samples_since_trigger(), 7);
        assert_eq!(rig.engine.missed_triggers(), 1);
        assert_eq!(rig.engine.trigger_count(), 0);
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
        assert_eq!(
            rig.store
                .integer(ParamKey::scope(0, BufferId::MissedTriggers)),
            Some(1)
        );
        assert!(rig
            .store
            .get(ParamKey::scope(0, BufferId::ResultData))
            .is_none());

        // The next trigger captures a contiguous window again
        rig.trigger.write_counter(4 * TICK_NS + 250_000).unwrap();
        rig.tick(4);
        rig.tick(5);
        rig.tick(6);
        let expected: Vec<f64> = (17..25).map(|v| v as f64).collect();
        assert_eq!(
            rig.store.reals(ParamKey::scope(0, BufferId::ResultData)),
            Some(expected)
        );
    }

    #[test]
    fn test_trigger_after_bus_recovery_uses_current_tick_only() {
        let mut rig = rig(4, 8);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.tick(1);
        rig.engine.execute(false).unwrap();

        // Bus back: a trigger one and a half ticks old cannot be assembled
        rig.trigger.write_counter(2 * TICK_NS + 500_000).unwrap();
        rig.tick(3);
        assert_eq!(rig.engine.missed_triggers(), 1);
        assert_eq!(rig.engine.fill_offset(), 0);

        // One tick later the previous scan is usable again
        rig.trigger.write_counter(3 * TICK_NS + 500_000).unwrap();
        rig.tick(4);
        assert_eq!(rig.engine.trigger_count(), 1);
        rig.tick(5);
        let expected: Vec<f64> = (14..22).map(|v| v as f64).collect();
        assert_eq!(
            rig.store.reals(ParamKey::scope(0, BufferId::ResultData)),
            Some(expected)
        );
    }

    #[test]
    fn test_bus_down_resets() {
        let mut rig = rig(4, 12);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(TICK_NS + 500_000).unwrap();
        rig.tick(1);
        rig.engine.execute(false).unwrap();
        assert_eq!(rig.engine.state(), CaptureState::WaitTrigger);
        assert_eq!(rig.engine.fill_offset(), 0);
        assert!(rig.engine.window().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_read_failure_leaves_state_unchanged() {
        let mut rig = rig(4, 12);
        rig.trigger.write_counter(1).unwrap();
        rig.tick(0);
        rig.trigger.write_counter(TICK_NS + 500_000).unwrap();
        rig.tick(1);
        let fill = rig.engine.fill_offset();

        rig.data.set_failure(Some("frame lost"));
        for _ in 0..2 {
            assert!(matches!(
                rig.engine.execute(true),
                Err(CaptureError::Source(SourceError::ReadFailed { .. }))
            ));
        }
        assert_eq!(rig.engine.fill_offset(), fill);
        assert_eq!(rig.engine.state(), CaptureState::Collecting);
    }
}
