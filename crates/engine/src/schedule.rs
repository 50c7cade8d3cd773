// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uptime-keyed poll backoff.
//!
//! Polls fast right after the daemon (re)starts, when a deploy has most
//! likely just happened, then settle to the steady interval.

use std::time::Duration;

use lc_core::{PollTier, WatchSettings};

/// Maps process uptime to the delay before the next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    tiers: Vec<PollTier>,
    steady: Duration,
}

impl PollSchedule {
    /// `tiers` must be sorted by `until_secs`; config validation ensures it.
    pub fn new(tiers: Vec<PollTier>, steady: Duration) -> Self {
        Self { tiers, steady }
    }

    pub fn from_settings(settings: &WatchSettings) -> Self {
        Self::new(settings.tiers.clone(), Duration::from_secs(settings.steady_interval_secs))
    }

    pub fn delay_for(&self, uptime: Duration) -> Duration {
        self.tiers
            .iter()
            .find(|tier| uptime < Duration::from_secs(tier.until_secs))
            .map(|tier| Duration::from_secs(tier.interval_secs))
            .unwrap_or(self.steady)
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
