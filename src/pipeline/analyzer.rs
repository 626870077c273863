// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Producer side of a spectrum analysis channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};

use super::worker::{spawn_worker, ComputeOptions, WorkerContext};
use super::{AcquisitionMode, AnalysisBuffers, AnalysisError, AnalysisStatus, StatusCell};
use crate::acquisition::decoder::decode_iter;
use crate::acquisition::{DataType, HostTiming, SampleSource, SourceError, SourceRegistry};
use crate::config::AnalysisConfig;
use crate::publish::{BufferId, ParamKey, ParamValue, ResultPublisher};
use crate::spectral::{create_transform, frequency_axis, Transform};

/// Why a batch was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The worker still owns the window
    Pending,
    Disabled,
    /// Skipped to reach the analysis rate
    Decimated,
    /// Triggered mode without a trigger command
    NotArmed,
    BusDown,
}

/// Result of feeding one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Dropped(DropReason),
    /// Elements stored, window not full yet
    Accepted { stored: usize },
    /// The window is full and was handed to the worker
    WindowComplete { stored: usize, overflow: usize },
}

struct WorkerHandle {
    jobs: Option<Sender<Box<AnalysisBuffers>>>,
    returns: Receiver<Box<AnalysisBuffers>>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        // Closing the job channel wakes a worker blocked in recv
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Analysis worker panicked");
            }
        }
    }
}

/// Fills analysis windows from the tick and dispatches them to a worker.
pub struct SpectrumAnalyzer {
    index: usize,
    config: AnalysisConfig,
    publisher: Arc<dyn ResultPublisher>,
    sample_rate_hz: f64,
    ignore_cycles: u64,
    skipped_cycles: u64,

    enabled: bool,
    mode: AcquisitionMode,
    armed: bool,
    status: Arc<StatusCell>,

    buffers: Option<Box<AnalysisBuffers>>,
    transform: Option<Box<dyn Transform>>,
    source: Option<Box<dyn SampleSource>>,
    scratch: Vec<u8>,
    frequency_axis: Vec<f64>,
    worker: Option<WorkerHandle>,
    overflow_elements: u64,
}

impl SpectrumAnalyzer {
    /// Create an unbound analyzer using the default FFT.
    ///
    /// ### Errors
    ///
    /// [`AnalysisError::InvalidConfig`] for an empty window, a missing source
    /// or an analysis rate that is not in `(0, tick rate]`.
    pub fn new(
        index: usize,
        config: AnalysisConfig,
        timing: HostTiming,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Result<Self, AnalysisError> {
        let transform = create_transform(config.nfft);
        Self::with_transform(index, config, timing, publisher, transform)
    }

    /// Create an unbound analyzer with a custom transform of length `nfft`.
    pub fn with_transform(
        index: usize,
        config: AnalysisConfig,
        timing: HostTiming,
        publisher: Arc<dyn ResultPublisher>,
        transform: Box<dyn Transform>,
    ) -> Result<Self, AnalysisError> {
        config.validate(&timing)?;
        if transform.len() != config.nfft {
            return Err(AnalysisError::InvalidConfig(format!(
                "transform length {} does not match window length {}",
                transform.len(),
                config.nfft
            )));
        }
        let sample_rate_hz = config.effective_rate(&timing);
        let ignore_cycles = config.ignore_cycles(&timing);
        debug!(
            "fft{}: created for source '{}' ({} samples at {} Hz, skipping {} ticks)",
            index, config.source, config.nfft, sample_rate_hz, ignore_cycles
        );
        Ok(Self {
            index,
            enabled: config.enable,
            mode: config.mode,
            buffers: Some(Box::new(AnalysisBuffers::new(config.nfft))),
            config,
            publisher,
            sample_rate_hz,
            ignore_cycles,
            skipped_cycles: 0,
            armed: false,
            status: Arc::new(StatusCell::new(AnalysisStatus::None)),
            transform: Some(transform),
            source: None,
            scratch: Vec::new(),
            frequency_axis: Vec::new(),
            worker: None,
            overflow_elements: 0,
        })
    }

    fn key(&self, buffer: BufferId) -> ParamKey {
        ParamKey::fft(self.index, buffer)
    }

    fn set_status(&self, status: AnalysisStatus) {
        if self.status.set(status) {
            self.publisher
                .publish(self.key(BufferId::Status), ParamValue::Text(status.as_str()));
        }
    }

    /// Resolve the source and start the worker. Binding twice is a no-op.
    pub fn bind(&mut self, registry: &dyn SourceRegistry) -> Result<(), AnalysisError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let source = registry.bind(&self.config.source)?;
        let info = source.info().clone();
        if !info.data_type.is_numeric() {
            return Err(SourceError::UnsupportedDataType {
                name: info.name,
                data_type: info.data_type,
            }
            .into());
        }
        if info.element_count == 0 {
            return Err(SourceError::Empty { name: info.name }.into());
        }

        let Some(transform) = self.transform.take() else {
            return Err(AnalysisError::WorkerSpawn(
                "transform already consumed".to_string(),
            ));
        };
        self.frequency_axis =
            frequency_axis(self.config.nfft, self.sample_rate_hz, info.element_count);

        let (job_tx, job_rx) = bounded(1);
        let (return_tx, return_rx) = bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let context = WorkerContext {
            index: self.index,
            options: ComputeOptions::from(&self.config),
            debug: self.config.debug,
            transform,
            frequency_axis: self.frequency_axis.clone(),
            publisher: Arc::clone(&self.publisher),
            status: Arc::clone(&self.status),
        };
        let thread = spawn_worker(context, job_rx, return_tx, Arc::clone(&cancel))?;
        self.worker = Some(WorkerHandle {
            jobs: Some(job_tx),
            returns: return_rx,
            cancel,
            thread: Some(thread),
        });

        self.scratch = vec![0u8; info.byte_size()];
        self.source = Some(source);
        info!(
            "fft{}: bound '{}' ({} x {}), {} point transform at {} Hz",
            self.index,
            info.name,
            info.element_count,
            info.data_type,
            self.config.nfft,
            self.sample_rate_hz
        );

        self.publisher
            .publish(self.key(BufferId::Source), ParamValue::Text(&self.config.source));
        self.publisher
            .publish(self.key(BufferId::Nfft), ParamValue::Integer(self.config.nfft as i64));
        self.publisher
            .publish(self.key(BufferId::SampleRate), ParamValue::Real(self.sample_rate_hz));
        self.publisher
            .publish(self.key(BufferId::Mode), ParamValue::Text(self.mode.as_str()));
        self.publisher
            .publish(self.key(BufferId::Enable), ParamValue::Flag(self.enabled));
        self.publisher
            .publish(self.key(BufferId::Armed), ParamValue::Flag(self.armed));
        self.set_status(AnalysisStatus::Idle);
        Ok(())
    }

    /// Read the bound source and feed its batch.
    pub fn execute(&mut self, bus_operational: bool) -> Result<BatchOutcome, AnalysisError> {
        let Some(source) = self.source.as_ref() else {
            return Err(AnalysisError::NotBound(self.config.source.clone()));
        };
        if !bus_operational {
            return Ok(BatchOutcome::Dropped(DropReason::BusDown));
        }
        source.read(&mut self.scratch)?;
        let data_type = source.info().data_type;

        let scratch = std::mem::take(&mut self.scratch);
        let outcome = self.push_batch(data_type, &scratch);
        self.scratch = scratch;
        outcome
    }

    /// Feed one batch of raw elements.
    pub fn push_batch(
        &mut self,
        data_type: DataType,
        bytes: &[u8],
    ) -> Result<BatchOutcome, AnalysisError> {
        if self.worker.is_none() {
            return Err(AnalysisError::NotBound(self.config.source.clone()));
        }
        self.poll_worker();

        if self.buffers.is_none() {
            return Ok(BatchOutcome::Dropped(DropReason::Pending));
        }
        if !self.enabled {
            return Ok(BatchOutcome::Dropped(DropReason::Disabled));
        }
        if self.skipped_cycles < self.ignore_cycles {
            self.skipped_cycles += 1;
            return Ok(BatchOutcome::Dropped(DropReason::Decimated));
        }
        self.skipped_cycles = 0;
        if self.mode == AcquisitionMode::Triggered && !self.armed {
            self.set_status(AnalysisStatus::Idle);
            return Ok(BatchOutcome::Dropped(DropReason::NotArmed));
        }

        let values = decode_iter(data_type, bytes)?;
        let Some(buffers) = self.buffers.as_mut() else {
            return Ok(BatchOutcome::Dropped(DropReason::Pending));
        };
        let (mut stored, mut overflow) = (0, 0);
        for value in values {
            if buffers.push(value) {
                stored += 1;
            } else {
                overflow += 1;
            }
        }
        self.overflow_elements += overflow as u64;

        if buffers.is_full() {
            self.hand_off()?;
            return Ok(BatchOutcome::WindowComplete { stored, overflow });
        }
        self.set_status(AnalysisStatus::Acquiring);
        Ok(BatchOutcome::Accepted { stored })
    }

    fn hand_off(&mut self) -> Result<(), AnalysisError> {
        let Some(buffers) = self.buffers.take() else {
            return Ok(());
        };
        if self.mode == AcquisitionMode::Triggered {
            self.armed = false;
            self.publisher
                .publish(self.key(BufferId::Armed), ParamValue::Flag(false));
        }
        // Set before sending so the worker's IDLE cannot be overwritten
        self.set_status(AnalysisStatus::Computing);

        let sent = match self.worker.as_ref().and_then(|w| w.jobs.as_ref()) {
            Some(jobs) => jobs.try_send(buffers).map_err(TrySendError::into_inner),
            None => Err(buffers),
        };
        match sent {
            Ok(()) => Ok(()),
            Err(buffers) => self.recover_from_stopped_worker(buffers),
        }
    }

    fn recover_from_stopped_worker(
        &mut self,
        mut buffers: Box<AnalysisBuffers>,
    ) -> Result<(), AnalysisError> {
        buffers.clear();
        self.buffers = Some(buffers);
        self.set_status(AnalysisStatus::Idle);
        Err(AnalysisError::WorkerStopped(self.index))
    }

    /// Take back the buffers if the worker has finished. Never blocks.
    pub fn poll_worker(&mut self) -> bool {
        if self.buffers.is_some() {
            return true;
        }
        if let Some(worker) = self.worker.as_ref() {
            if let Ok(buffers) = worker.returns.try_recv() {
                self.buffers = Some(buffers);
                return true;
            }
        }
        false
    }

    /// Block until the worker has returned the buffers. Not for use in the tick.
    pub fn wait_for_worker(&mut self, timeout: Duration) -> bool {
        if self.buffers.is_some() {
            return true;
        }
        if let Some(worker) = self.worker.as_ref() {
            if let Ok(buffers) = worker.returns.recv_timeout(timeout) {
                self.buffers = Some(buffers);
                return true;
            }
        }
        false
    }

    pub fn set_enable(&mut self, enable: bool) {
        if enable != self.enabled {
            info!(
                "fft{}: {}",
                self.index,
                if enable { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enable;
        if !enable {
            self.clear();
        }
        self.publisher
            .publish(self.key(BufferId::Enable), ParamValue::Flag(enable));
    }

    /// Force-trigger command: discard the partial window and arm one capture.
    pub fn trigger(&mut self) {
        debug!("fft{}: trigger command", self.index);
        self.clear();
        self.armed = true;
        self.publisher
            .publish(self.key(BufferId::Armed), ParamValue::Flag(true));
    }

    /// Discard the partial window. A window owned by the worker is not touched.
    pub fn clear(&mut self) {
        self.poll_worker();
        if let Some(buffers) = self.buffers.as_mut() {
            buffers.clear();
        }
        self.skipped_cycles = 0;
    }

    pub fn set_mode(&mut self, mode: AcquisitionMode) {
        if mode != self.mode {
            info!("fft{}: mode {}", self.index, mode);
        }
        self.mode = mode;
        self.publisher
            .publish(self.key(BufferId::Mode), ParamValue::Text(mode.as_str()));
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status.get()
    }

    pub fn is_bound(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn window_size(&self) -> usize {
        self.config.nfft
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn ignore_cycles(&self) -> u64 {
        self.ignore_cycles
    }

    /// Samples stored in the current window, `None` while the worker owns it
    pub fn fill_level(&self) -> Option<usize> {
        self.buffers.as_ref().map(|buffers| buffers.filled())
    }

    /// Samples received after a window was already full
    pub fn overflow_elements(&self) -> u64 {
        self.overflow_elements
    }

    pub fn frequency_axis(&self) -> &[f64] {
        &self.frequency_axis
    }
}
