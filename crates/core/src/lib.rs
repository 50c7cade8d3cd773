// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lc-core: shared domain types for the lcloud build daemon

pub mod macros;

pub mod clock;
pub mod commit;
pub mod config;
pub mod outcome;
pub mod stage;
pub mod target;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use commit::CommitId;
pub use config::{
    BuildSettings, CloudSettings, CommandLine, ConfigError, GuestSettings, HostSettings, HypervisorSettings,
    LedgerSettings, PollTier, PublishSettings, Settings, WatchSettings,
};
pub use outcome::{BuildOutcome, OutcomeStatus};
pub use stage::{Stage, UnknownStage};
pub use target::{Credential, RemoteTarget};
pub use time_fmt::{format_elapsed, format_elapsed_ms};
