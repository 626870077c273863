// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust real-time scope library
//!
//! Trigger-aligned capture of oversampled process data and spectrum
//! analysis off the real-time tick.
//!
//! ## Modules
//!
//! * [`acquisition`]: sample sources, element decoding and the simulated bus
//! * [`capture`]: the trigger-aligned capture engine
//! * [`pipeline`]: window acquisition and the background compute worker
//! * [`preprocessing`]: mean and linear trend removal
//! * [`spectral`]: FFT, magnitude and frequency axis
//! * [`publish`]: result parameters and the in-memory parameter store
//! * [`config`]: YAML configuration and option strings
//! * [`daemon`]: channel table and the host tick loop

pub mod acquisition;
pub mod capture;
pub mod config;
pub mod daemon;
pub mod pipeline;
pub mod preprocessing;
pub mod publish;
pub mod spectral;
pub mod utility;
