// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The startup profile: plans and devices the environment exposes.
//!
//! Loading can take seconds to tens of seconds for real instruments;
//! `load_delay_ms` simulates that window so that the opening states stay
//! observable. While the profile loads, the worker only serves `status`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_steps() -> u32 {
    10
}

fn default_step_delay_ms() -> u64 {
    100
}

/// One executable plan definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDef {
    pub name: String,
    /// Step count when the item's kwargs don't say otherwise.
    #[serde(default = "default_steps")]
    pub default_steps: u32,
    /// Per-step duration when the item's kwargs don't say otherwise.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl PlanDef {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default_steps: default_steps(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

/// The loaded environment: allowed plans and devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupProfile {
    #[serde(default)]
    pub plans: Vec<PlanDef>,
    #[serde(default)]
    pub devices: Vec<String>,
    /// Simulated profile load time.
    #[serde(default)]
    pub load_delay_ms: u64,
}

impl StartupProfile {
    /// Profile used when no profile file is configured.
    pub fn builtin() -> Self {
        Self {
            plans: vec![PlanDef::new("count"), PlanDef::new("scan"), PlanDef::new("sleep")],
            devices: vec!["det1".to_string(), "det2".to_string(), "motor1".to_string()],
            load_delay_ms: 0,
        }
    }

    /// Parse a profile from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn find_plan(&self, name: &str) -> Option<&PlanDef> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn plan_names(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.name.clone()).collect()
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
