// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build stages: the roles an lcloud process can play.
//!
//! Serializes to/from its role name: `"host"`, `"cloud"`, `"guest-win11"`,
//! `"guest-macos"`. Parsing is case-insensitive and accepts `_` for `-`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A role in the build fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// The developer machine: compiles the Linux targets locally.
    Host,
    /// The hypervisor machine: coordinates the guest builds.
    Cloud,
    /// Windows guest VM.
    GuestWin,
    /// macOS guest VM.
    GuestMac,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Host, Stage::Cloud, Stage::GuestWin, Stage::GuestMac];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Host => "host",
            Stage::Cloud => "cloud",
            Stage::GuestWin => "guest-win11",
            Stage::GuestMac => "guest-macos",
        }
    }

    /// Prefix for forwarded output lines, e.g. `"[ cloud ] "`.
    pub fn label(self) -> String {
        format!("[ {} ] ", self.name())
    }

    pub fn is_guest(self) -> bool {
        matches!(self, Stage::GuestWin | Stage::GuestMac)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a role name that matches no stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected one of: host, cloud, guest-win11, guest-macos)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_ascii_lowercase().replace('_', "-");
        match folded.as_str() {
            "host" => Ok(Stage::Host),
            "cloud" => Ok(Stage::Cloud),
            "guest-win11" | "guest-win" => Ok(Stage::GuestWin),
            "guest-macos" | "guest-mac" => Ok(Stage::GuestMac),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
