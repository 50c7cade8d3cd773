// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lcloudd stage <role>` - perform one role on this machine

use std::path::Path;
use std::sync::Arc;

use lc_core::Stage;

use super::load_settings;
use crate::lifecycle;
use crate::ExitError;

/// Run by a coordinator over SSH (or by hand). Exit code 1 tells the
/// coordinator the role failed.
pub async fn stage(config: &Path, stage: Stage) -> Result<(), ExitError> {
    let settings = Arc::new(load_settings(config)?);
    settings.preflight_perform(stage).map_err(ExitError::fatal)?;

    lifecycle::stage_runner(&settings)
        .perform(stage)
        .await
        .map_err(|e| ExitError::failed(format!("{stage} failed: {e}")))
}
