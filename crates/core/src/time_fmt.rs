// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable durations for stage timing lines.

use std::time::Duration;

/// Format a duration as `"42.0s"` or `"3m 7.5s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64();
    let minutes = (total / 60.0).floor();
    if minutes >= 1.0 {
        format!("{}m {:.1}s", minutes as u64, total - minutes * 60.0)
    } else {
        format!("{:.1}s", total)
    }
}

pub fn format_elapsed_ms(ms: u64) -> String {
    format_elapsed(Duration::from_millis(ms))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
