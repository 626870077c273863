// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::registry::{ChannelHandle, ChannelTable, Command};
use crate::acquisition::SimulatedBus;
use crate::config::Config;
use crate::publish::ParameterStore;

/// Capacity of the operator command queue
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Runs the host tick loop and its companion tasks
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    shutdown: Arc<watch::Sender<bool>>,
    cycles: Arc<AtomicU64>,
    store: Arc<ParameterStore>,
    commands: Option<mpsc::Sender<(ChannelHandle, Command)>>,
    cycle_limit: Option<u64>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            shutdown: Arc::new(shutdown),
            cycles: Arc::new(AtomicU64::new(0)),
            store: Arc::new(ParameterStore::new()),
            commands: None,
            cycle_limit: None,
        }
    }

    /// Stop the tick loop by itself after `cycles` ticks
    pub fn with_cycle_limit(mut self, cycles: u64) -> Self {
        self.cycle_limit = Some(cycles);
        self
    }

    /// Launch all configured tasks based on configuration
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        self.start_tick_loop(config)?;

        // Start heartbeat task for monitoring
        self.start_heartbeat(Duration::from_secs(config.host.heartbeat_secs.max(1)))?;

        Ok(())
    }

    /// Start the host tick loop driving the simulated bus and every channel
    fn start_tick_loop(&mut self, config: &Config) -> Result<()> {
        let mut bus = SimulatedBus::new(&config.simulation, &config.host)
            .context("Failed to create the simulated bus")?;
        let mut table = ChannelTable::from_config(config, self.store.clone())?;
        table
            .enter_realtime(bus.registry())
            .context("Failed to bind channels")?;

        let period = config.host.timing().period().max(Duration::from_nanos(1));
        info!(
            "Starting tick loop at {} Hz ({:?} per tick)",
            config.host.tick_rate_hz, period
        );

        let (tx, mut rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        self.commands = Some(tx);

        let shutdown = self.shutdown.clone();
        let mut stop = self.shutdown.subscribe();
        let cycles = self.cycles.clone();
        let limit = self.cycle_limit;
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while !*stop.borrow() {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }

                // Commands are applied between ticks, never inside one
                while let Ok((handle, command)) = rx.try_recv() {
                    if let Err(e) = table.dispatch(handle, command) {
                        warn!("Command {:?} for {:?} rejected: {}", command, handle, e);
                    }
                }

                bus.advance();
                if let Err(e) = table.execute_cycle(bus.is_operational()) {
                    warn!("Cycle {} failed: {}", bus.cycle(), e);
                }
                let done = cycles.fetch_add(1, Ordering::SeqCst) + 1;

                if limit.is_some_and(|limit| done >= limit) {
                    info!("Cycle limit of {} reached", done);
                    shutdown.send_replace(true);
                    break;
                }
            }
            debug!("Tick loop stopped after {} cycles", bus.cycle());

            // Dropping the table joins the analysis worker threads
            tokio::task::spawn_blocking(move || drop(table))
                .await
                .context("Failed to stop analysis workers")?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self, every: Duration) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let mut stop = self.shutdown.subscribe();
        let cycles = self.cycles.clone();
        let task = tokio::spawn(async move {
            let mut interval = time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            while !*stop.borrow() {
                tokio::select! {
                    _ = interval.tick() => {
                        info!("Daemon heartbeat: {} cycles", cycles.load(Ordering::SeqCst));
                    }
                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Shared store receiving every published parameter
    pub fn store(&self) -> Arc<ParameterStore> {
        self.store.clone()
    }

    /// Number of ticks executed so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Sender for operator commands, available once launched
    pub fn command_sender(&self) -> Option<mpsc::Sender<(ChannelHandle, Command)>> {
        self.commands.clone()
    }

    /// Queue a command for the next tick
    pub async fn send_command(&self, handle: ChannelHandle, command: Command) -> Result<()> {
        let sender = self
            .commands
            .as_ref()
            .context("Daemon is not launched")?;
        sender
            .send((handle, command))
            .await
            .map_err(|_| anyhow::anyhow!("Tick loop has stopped"))
    }

    /// Wait until the tick loop stops by itself or [`Daemon::shutdown`] is called
    pub async fn stopped(&self) {
        let mut stop = self.shutdown.subscribe();
        // Only fails if the sender is gone, which cannot happen while self lives
        let _ = stop.wait_for(|stopped| *stopped).await;
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.shutdown.send_replace(true);
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Err(e)) => error!("Task failed: {}", e),
                Err(e) => error!("Task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        Ok(())
    }
}
