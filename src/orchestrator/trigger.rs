//! Abstraction over "request OS reboot now".
//!
//! `verify` is split from `fire` so the executor can confirm the reboot
//! command is actually issuable before it persists any reboot-pending
//! state. On success `fire` never returns: the process parks and waits for
//! the OS to terminate it.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::errors::TriggerError;

#[async_trait]
pub trait RebootTrigger: Send + Sync {
    /// Confirm the reboot command can be issued. Called before any state
    /// mutation.
    fn verify(&self) -> Result<(), TriggerError>;

    /// Issue the reboot. The production implementation does not return on
    /// success; an `Ok(())` is only observable from test doubles and means
    /// "the process would have been terminated here".
    async fn fire(&self) -> Result<(), TriggerError>;
}

/// Runs the configured reboot command line via `sh -c`.
pub struct CommandRebootTrigger {
    command: String,
}

impl CommandRebootTrigger {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// First whitespace-separated token of the command line.
    fn binary(&self) -> Option<&str> {
        self.command.split_whitespace().next()
    }
}

fn binary_resolvable(binary: &str) -> bool {
    let path = Path::new(binary);
    if path.is_absolute() || binary.contains('/') {
        return path.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
        })
        .unwrap_or(false)
}

#[async_trait]
impl RebootTrigger for CommandRebootTrigger {
    fn verify(&self) -> Result<(), TriggerError> {
        let binary = self.binary().ok_or_else(|| TriggerError::CommandNotFound {
            command: self.command.clone(),
        })?;

        if !binary_resolvable(binary) {
            return Err(TriggerError::CommandNotFound {
                command: self.command.clone(),
            });
        }

        Ok(())
    }

    async fn fire(&self) -> Result<(), TriggerError> {
        tracing::debug!(command = %self.command, "Issuing reboot command");

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .status()
            .await
            .map_err(|source| TriggerError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(TriggerError::CommandFailed {
                command: self.command.clone(),
                status,
            });
        }

        // The reboot is in flight. Park until the OS kills this process;
        // nothing after this point may mutate state.
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_finds_binary_on_path() {
        // `sh` exists on every platform these tests run on
        let trigger = CommandRebootTrigger::new("sh -c true");
        trigger.verify().unwrap();
    }

    #[test]
    fn test_verify_absolute_path() {
        let trigger = CommandRebootTrigger::new("/bin/sh -c true");
        trigger.verify().unwrap();
    }

    #[test]
    fn test_verify_missing_binary_is_command_not_found() {
        let trigger = CommandRebootTrigger::new("definitely-not-a-real-reboot-binary now");
        let err = trigger.verify().unwrap_err();
        assert!(matches!(err, TriggerError::CommandNotFound { .. }));
    }

    #[test]
    fn test_verify_missing_absolute_path() {
        let trigger = CommandRebootTrigger::new("/nonexistent/rebooter");
        let err = trigger.verify().unwrap_err();
        assert!(matches!(err, TriggerError::CommandNotFound { .. }));
    }

    #[test]
    fn test_verify_empty_command() {
        let trigger = CommandRebootTrigger::new("");
        let err = trigger.verify().unwrap_err();
        assert!(matches!(err, TriggerError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fire_reports_command_failure() {
        // A command that runs but exits non-zero must surface the status
        // instead of parking.
        let trigger = CommandRebootTrigger::new("exit 3");
        let err = trigger.fire().await.unwrap_err();
        match err {
            TriggerError::CommandFailed { status, .. } => {
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
    }
}
