//! Typed error hierarchy for the baton orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `StoreError` — durable state store failures (fatal, non-resumable)
//! - `TriggerError` — reboot command could not be issued
//! - `ExecutorError` — phase/step execution failures

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors from the durable state store.
///
/// Any of these is fatal to the run: there is no safe partial state to
/// resume from, so the orchestrator aborts rather than guessing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read state record at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state record at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove state record at {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State record at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors from the reboot trigger.
///
/// A trigger failure must never leave a reboot-pending state record behind;
/// `verify` runs before any state mutation so the common case (missing
/// reboot binary) is reported with nothing persisted.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Reboot command '{command}' not found")]
    CommandNotFound { command: String },

    #[error("Failed to spawn reboot command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reboot command '{command}' exited with {status}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Errors from a single run execution.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Step '{step}' in phase '{phase}' failed with exit code {code}")]
    StepFailed {
        phase: String,
        step: String,
        code: i32,
    },

    #[error("Failed to run step '{step}': {source}")]
    StepIo {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to run log: {0}")]
    Sink(#[source] std::io::Error),

    #[error("Persisted state for run {run_id} does not match the loaded plan; refusing to resume")]
    PlanDrift { run_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),
}
