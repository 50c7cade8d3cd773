// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lcloud build daemon
//!
//! Wires the engine to real adapters and exposes the `lcloudd`
//! subcommands to the binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod commands;
pub mod env;
pub mod exit_error;
pub mod lifecycle;
pub mod logging;

pub use exit_error::ExitError;
pub use lifecycle::{DaemonLock, LifecycleError, Paths};
