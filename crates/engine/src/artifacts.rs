// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact age report.
//!
//! Remote stages can fail without the failure reaching us (a guest that
//! never ran, a copy that silently skipped). An artifact much older than
//! the attempt is the visible symptom, so every finished host or cloud
//! stage lists the ages of what is on disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use lc_core::format_elapsed;
use walkdir::WalkDir;

/// Artifacts older than this are reported as stale.
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactAge {
    pub path: PathBuf,
    pub age: Duration,
}

impl ArtifactAge {
    pub fn is_stale(&self) -> bool {
        self.age > STALE_AFTER
    }
}

/// Find entries under `root` whose file name is one of `names`, at most
/// `max_depth` levels down. Matching directories (app bundles) are not
/// descended into.
pub fn find_artifacts(root: &Path, names: &[String], max_depth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).max_depth(max_depth).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let matched = entry.file_name().to_str().is_some_and(|name| names.iter().any(|n| n == name));
        if matched {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            found.push(entry.into_path());
        }
    }
    found
}

/// Ages of every artifact under `root`, relative to `now`.
pub fn artifact_ages(root: &Path, names: &[String], max_depth: usize, now: SystemTime) -> Vec<ArtifactAge> {
    find_artifacts(root, names, max_depth)
        .into_iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            let age = now.duration_since(modified).unwrap_or_default();
            Some(ArtifactAge { path, age })
        })
        .collect()
}

/// Log the age of every artifact under `root`, warning on stale ones.
pub fn report(root: &Path, names: &[String], max_depth: usize) -> Vec<ArtifactAge> {
    let ages = artifact_ages(root, names, max_depth, SystemTime::now());
    if ages.is_empty() {
        tracing::warn!(root = %root.display(), "no build artifacts found");
    }
    for artifact in &ages {
        if artifact.is_stale() {
            tracing::warn!(
                path = %artifact.path.display(),
                age = %format_elapsed(artifact.age),
                "artifact is very old; a remote build may have failed silently"
            );
        } else {
            tracing::info!(path = %artifact.path.display(), age = %format_elapsed(artifact.age), "artifact");
        }
    }
    ages
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
