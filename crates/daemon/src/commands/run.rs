// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd run` - the long-running poll loop

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::load_settings;
use crate::env::VERSION;
use crate::lifecycle::{self, shutdown_signal, DaemonLock, Paths};
use crate::ExitError;

pub async fn run(config: &Path, paths: &Paths) -> Result<(), ExitError> {
    let settings = Arc::new(load_settings(config)?);
    let lock = DaemonLock::acquire(&paths.lock_path).map_err(ExitError::fatal)?;
    let service = lifecycle::service(&settings, &paths.ledger_path).map_err(ExitError::fatal)?;

    info!(
        version = VERSION,
        pid = std::process::id(),
        config = %config.display(),
        lock = %lock.path().display(),
        stages = ?settings.build.dispatch.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "lcloudd started"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match shutdown_signal().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => error!(error = %e, "could not listen for signals, stopping"),
            }
            shutdown.cancel();
        }
    });

    service.run(shutdown).await;
    drop(lock);
    info!("lcloudd stopped");
    Ok(())
}
