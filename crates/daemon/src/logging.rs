// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: stdout always, plus a daily-rolling file for the
//! long-running daemon.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "lcloudd.log";

/// `RUST_LOG` when set and valid, otherwise `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// With `log_dir`, records are also written to a daily file there. The
/// returned guard flushes that file on drop, so hold it for the life of
/// the process.
pub fn init(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let stdout = fmt::layer().with_target(false);
    let Some(dir) = log_dir else {
        let _ = tracing_subscriber::registry().with(env_filter()).with(stdout).try_init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_ansi(false).with_writer(writer);
    let _ = tracing_subscriber::registry().with(env_filter()).with(stdout).with(file).try_init();
    Ok(Some(guard))
}
