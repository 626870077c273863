// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module runs the host side of the application: a tick loop
//! that advances the simulated process image and executes every capture
//! and analysis channel, plus a heartbeat for monitoring.
//!
//! ## Components
//!
//! * **Channel table**: creation, binding, per-tick execution and command
//!   routing for all channels
//! * **Launch Daemon**: starting, monitoring, and gracefully shutting down
//!   background tasks
//!
//! ## Usage
//!
//! ```no_run
//! use rust_rtscope::{config::Config, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
pub mod registry;

pub use launch_daemon::Daemon;
pub use registry::{ChannelError, ChannelHandle, ChannelTable, Command};
