// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel table
//!
//! Owns every capture engine and spectrum analyzer of a host, binds them
//! when the host enters real-time and runs them once per tick in creation
//! order. Operator commands are routed by [`ChannelHandle`].

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::{HostTiming, SourceRegistry};
use crate::capture::{CaptureEngine, CaptureError};
use crate::config::{AcquisitionMode, AnalysisConfig, CaptureConfig, Config};
use crate::pipeline::{AnalysisError, SpectrumAnalyzer};
use crate::publish::ResultPublisher;

/// Identifies a channel created in a [`ChannelTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelHandle {
    Capture(usize),
    Analysis(usize),
}

/// Operator command applied between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Enable(bool),
    /// Force-trigger: restart a capture, or arm a single-shot analysis
    Trigger,
    /// Drop the partial window without arming
    Clear,
    SetMode(AcquisitionMode),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("No channel for handle {0:?}")]
    NotFound(ChannelHandle),

    #[error("Command {command:?} is not supported by {handle:?}")]
    Unsupported {
        handle: ChannelHandle,
        command: Command,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Every channel of one host.
pub struct ChannelTable {
    timing: HostTiming,
    publisher: Arc<dyn ResultPublisher>,
    captures: Vec<CaptureEngine>,
    analyzers: Vec<SpectrumAnalyzer>,
    realtime: bool,
}

impl ChannelTable {
    pub fn new(timing: HostTiming, publisher: Arc<dyn ResultPublisher>) -> Self {
        Self {
            timing,
            publisher,
            captures: Vec::new(),
            analyzers: Vec::new(),
            realtime: false,
        }
    }

    /// Create every channel declared in `config`.
    pub fn from_config(
        config: &Config,
        publisher: Arc<dyn ResultPublisher>,
    ) -> anyhow::Result<Self> {
        let mut table = Self::new(config.host.timing(), publisher);
        for capture in config.capture_configs()? {
            table.add_capture(capture)?;
        }
        for analysis in config.analysis_configs()? {
            table.add_analyzer(analysis)?;
        }
        info!(
            "Channel table ready: {} scopes, {} analyzers",
            table.captures.len(),
            table.analyzers.len()
        );
        Ok(table)
    }

    pub fn add_capture(&mut self, config: CaptureConfig) -> Result<ChannelHandle, ChannelError> {
        let index = self.captures.len();
        let engine = CaptureEngine::new(index, config, self.timing, Arc::clone(&self.publisher))
            .map_err(|e| {
                error!("scope{}: construction failed: {}", index, e);
                e
            })?;
        self.captures.push(engine);
        Ok(ChannelHandle::Capture(index))
    }

    pub fn add_analyzer(&mut self, config: AnalysisConfig) -> Result<ChannelHandle, ChannelError> {
        let index = self.analyzers.len();
        let analyzer =
            SpectrumAnalyzer::new(index, config, self.timing, Arc::clone(&self.publisher))
                .map_err(|e| {
                    error!("fft{}: construction failed: {}", index, e);
                    e
                })?;
        self.analyzers.push(analyzer);
        Ok(ChannelHandle::Analysis(index))
    }

    /// Bind every channel against `registry`. Channels already bound are skipped.
    pub fn enter_realtime(&mut self, registry: &dyn SourceRegistry) -> Result<(), ChannelError> {
        for engine in self.captures.iter_mut() {
            engine.bind(registry).map_err(|e| {
                error!("scope{}: binding failed: {}", engine.index(), e);
                e
            })?;
        }
        for analyzer in self.analyzers.iter_mut() {
            analyzer.bind(registry).map_err(|e| {
                error!("fft{}: binding failed: {}", analyzer.index(), e);
                e
            })?;
        }
        if !self.realtime {
            debug!("Channel table entered real-time");
        }
        self.realtime = true;
        Ok(())
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    /// Run one tick on every channel.
    ///
    /// A failing channel does not prevent the others from running; the
    /// first error is returned.
    pub fn execute_cycle(&mut self, bus_operational: bool) -> Result<(), ChannelError> {
        let mut first_error = None;
        for engine in self.captures.iter_mut() {
            if let Err(e) = engine.execute(bus_operational) {
                first_error.get_or_insert(ChannelError::from(e));
            }
        }
        for analyzer in self.analyzers.iter_mut() {
            if let Err(e) = analyzer.execute(bus_operational) {
                first_error.get_or_insert(ChannelError::from(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply an operator command.
    pub fn dispatch(
        &mut self,
        handle: ChannelHandle,
        command: Command,
    ) -> Result<(), ChannelError> {
        debug!("Command {:?} for {:?}", command, handle);
        match handle {
            ChannelHandle::Capture(index) => {
                let engine = self
                    .captures
                    .get_mut(index)
                    .ok_or(ChannelError::NotFound(handle))?;
                match command {
                    Command::Enable(enable) => engine.set_enable(enable),
                    Command::Trigger => engine.trigger(),
                    Command::Clear => engine.clear(),
                    Command::SetMode(_) => {
                        warn!("scope{}: acquisition mode is not applicable", index);
                        return Err(ChannelError::Unsupported { handle, command });
                    }
                }
            }
            ChannelHandle::Analysis(index) => {
                let analyzer = self
                    .analyzers
                    .get_mut(index)
                    .ok_or(ChannelError::NotFound(handle))?;
                match command {
                    Command::Enable(enable) => analyzer.set_enable(enable),
                    Command::Trigger => analyzer.trigger(),
                    Command::Clear => analyzer.clear(),
                    Command::SetMode(mode) => analyzer.set_mode(mode),
                }
            }
        }
        Ok(())
    }

    pub fn handles(&self) -> Vec<ChannelHandle> {
        (0..self.captures.len())
            .map(ChannelHandle::Capture)
            .chain((0..self.analyzers.len()).map(ChannelHandle::Analysis))
            .collect()
    }

    pub fn capture(&self, index: usize) -> Option<&CaptureEngine> {
        self.captures.get(index)
    }

    pub fn analyzer(&self, index: usize) -> Option<&SpectrumAnalyzer> {
        self.analyzers.get(index)
    }

    pub fn analyzer_mut(&mut self, index: usize) -> Option<&mut SpectrumAnalyzer> {
        self.analyzers.get_mut(index)
    }

    pub fn captures(&self) -> &[CaptureEngine] {
        &self.captures
    }

    pub fn analyzers(&self) -> &[SpectrumAnalyzer] {
        &self.analyzers
    }
}
