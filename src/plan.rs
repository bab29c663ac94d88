//! Plan definition and JSON loading for the baton orchestrator.
//!
//! This module provides:
//! - `Step` and `Phase` structs representing the units of a test plan
//! - `PlanFile` struct representing the full plan.json format
//! - Loading/saving functions for JSON-based plan configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A single unit of work within a phase.
///
/// A step runs a shell script whose output is streamed to the run log. The
/// script may request a reboot as its terminal action by printing the
/// literal marker line `Requesting reboot: <count>` (the `request-reboot`
/// subcommand produces exactly that line from the `REBOOT_COUNT`
/// environment variable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Step name, used in log lines and error messages
    pub name: String,
    /// Shell script executed via `sh -c`
    pub script: String,
    /// Whether a non-zero exit continues the run instead of aborting it.
    /// The failure is always recorded in the run log either way.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Step {
    pub fn new(name: &str, script: &str) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_string(),
            continue_on_error: false,
        }
    }
}

/// A named, ordered group of steps; the unit of resumption granularity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    /// Human-readable name of the phase
    pub name: String,
    /// Ordered steps executed within this phase
    pub steps: Vec<Step>,
    /// Completion flag. Runtime-only: set for phases behind the resumed
    /// cursor so they are never re-executed.
    #[serde(skip)]
    pub complete: bool,
}

impl Phase {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            complete: false,
        }
    }
}

/// Represents the full plan.json file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    /// Plan name, the first segment of phase paths in log lines
    pub name: String,
    /// Timestamp when the plan was generated
    #[serde(default)]
    pub generated_at: String,
    /// Ordered list of phases
    pub phases: Vec<Phase>,
    /// SHA-256 of the plan file bytes, computed at load time. A resumed run
    /// is refused when this differs from the hash persisted in its state
    /// record.
    #[serde(skip)]
    pub plan_hash: String,
}

impl PlanFile {
    /// Load a plan from a JSON file and hash its raw bytes.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;

        let mut plan: PlanFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse plan JSON: {}", path.display()))?;
        plan.plan_hash = hash_bytes(content.as_bytes());

        Ok(plan)
    }

    /// Save the plan to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize plan to JSON")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write plan file: {}", path.display()))?;

        Ok(())
    }

    /// Get a specific phase by name.
    pub fn get_phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }
}

/// Hex-encoded SHA-256 of the given bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
