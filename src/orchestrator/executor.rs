//! Phase execution with reboot-aware persistence.
//!
//! Phases run strictly in order from the stored cursor. Step output is
//! streamed into the log sink line by line, and a step requests a reboot by
//! printing the literal marker `Requesting reboot: <count>`. On a request
//! the executor verifies the trigger, emits the reboot-count log line,
//! persists the advanced cursor and incremented counter, and only then
//! fires. The save must be committed before the process can be killed.
//!
//! The executor has no opinion on *whether* to reboot; conditional logic
//! such as "reboot only on the first boot" lives in the step script, which
//! sees the current count through the `REBOOT_COUNT` environment variable.

use regex::Regex;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::errors::ExecutorError;
use crate::orchestrator::resume::Run;
use crate::orchestrator::sink::LogSink;
use crate::orchestrator::store::{StateRecord, StateStore};
use crate::orchestrator::trigger::RebootTrigger;
use crate::plan::{Phase, Step};

/// Environment variable carrying the boot count into step scripts.
pub const REBOOT_COUNT_VAR: &str = "REBOOT_COUNT";

/// Literal prefix of the reboot request marker emitted by step scripts.
pub const REBOOT_REQUEST_PREFIX: &str = "Requesting reboot: ";

const REBOOT_REQUEST_PATTERN: &str = r"^Requesting reboot: (\d+)\s*$";

/// How a single process instance finished its share of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All phases exhausted; state cleared.
    Completed,
    /// A reboot was requested and the trigger fired. Only observable with
    /// test doubles; the production trigger never returns on success.
    RebootIssued,
}

pub struct PhaseExecutor<'a> {
    store: &'a dyn StateStore,
    trigger: &'a dyn RebootTrigger,
    sink: &'a mut LogSink,
    marker: Regex,
    /// Externally supplied boot count, captured once at construction. When
    /// present it is passed through to steps unchanged; the persisted
    /// counter is used otherwise. The two are updated by different
    /// authorities and are never assumed equivalent.
    external_count: Option<String>,
}

impl<'a> PhaseExecutor<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        trigger: &'a dyn RebootTrigger,
        sink: &'a mut LogSink,
    ) -> Self {
        Self {
            store,
            trigger,
            sink,
            marker: Regex::new(REBOOT_REQUEST_PATTERN).expect("static marker pattern is valid"),
            external_count: std::env::var(REBOOT_COUNT_VAR).ok(),
        }
    }

    /// Execute the run from its cursor to completion or to a reboot.
    pub async fn execute(&mut self, run: &mut Run) -> Result<RunOutcome, ExecutorError> {
        if run.cursor >= run.phases.len() {
            // A resumed cursor past the last phase: nothing left to do.
            self.store.clear()?;
            self.sink
                .append(&format!("Run {} complete, nothing left to execute", run.id))
                .map_err(ExecutorError::Sink)?;
            return Ok(RunOutcome::Completed);
        }

        let mut last_saved = run.record();
        self.store.save(&last_saved)?;

        while run.cursor < run.phases.len() {
            let idx = run.cursor;
            if run.phases[idx].complete {
                run.cursor = idx + 1;
                continue;
            }

            let phase = run.phases[idx].clone();
            let path = run.phase_path(&phase);
            tracing::debug!(phase = %phase.name, cursor = idx, "Executing phase");
            self.sink
                .append(&format!("Phase {path} started"))
                .map_err(ExecutorError::Sink)?;

            let mut reboot_requested = false;
            for step in &phase.steps {
                if self.run_step(run, &phase, step).await? {
                    // A reboot request is a step's terminal action.
                    reboot_requested = true;
                    break;
                }
            }

            if reboot_requested {
                // The trigger must be issuable before any state mutation.
                self.trigger.verify()?;

                self.sink
                    .append(&format!(
                        "Rebooting during test {path}, reboot count: {}",
                        run.reboot_count
                    ))
                    .map_err(ExecutorError::Sink)?;

                let prior = last_saved.clone();
                run.cursor = idx + 1;
                run.reboot_count += 1;
                let record = run.record();
                self.store.save(&record)?;
                last_saved = record;

                if let Err(err) = self.trigger.fire().await {
                    self.restore_after_failed_fire(&prior);
                    return Err(err.into());
                }
                return Ok(RunOutcome::RebootIssued);
            }

            run.phases[idx].complete = true;
            run.cursor = idx + 1;
            let record = run.record();
            self.store.save(&record)?;
            last_saved = record;
            self.sink
                .append(&format!("Phase {path} passed"))
                .map_err(ExecutorError::Sink)?;
        }

        self.store.clear()?;
        self.sink
            .append(&format!("Run {} complete", run.id))
            .map_err(ExecutorError::Sink)?;
        Ok(RunOutcome::Completed)
    }

    /// Run one step, streaming its output into the sink. Returns whether
    /// the step requested a reboot.
    async fn run_step(
        &mut self,
        run: &Run,
        phase: &Phase,
        step: &Step,
    ) -> Result<bool, ExecutorError> {
        let step_io = |source| ExecutorError::StepIo {
            step: step.name.clone(),
            source,
        };

        let count_env = self
            .external_count
            .clone()
            .unwrap_or_else(|| run.reboot_count.to_string());

        tracing::debug!(step = %step.name, reboot_count = %count_env, "Running step");

        // stderr is folded into stdout so the sink records one ordered
        // stream, matching what external assertions inspect.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec 2>&1\n{}", step.script))
            .env(REBOOT_COUNT_VAR, &count_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(step_io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| step_io(std::io::Error::other("stdout pipe missing")))?;
        let mut reader = BufReader::new(stdout).lines();

        let mut requested_count: Option<u32> = None;
        while let Some(line) = reader.next_line().await.map_err(step_io)? {
            if let Some(caps) = self.marker.captures(&line) {
                requested_count = caps[1].parse().ok();
            }
            self.sink.append(&line).map_err(ExecutorError::Sink)?;
        }

        let status = child.wait().await.map_err(step_io)?;

        if let Some(step_count) = requested_count {
            if step_count != run.reboot_count {
                // External boot indicator and persisted counter are updated
                // by different authorities; log the divergence, trust ours.
                tracing::debug!(
                    step_count,
                    run_count = run.reboot_count,
                    "Step-reported boot count differs from persisted counter"
                );
            }
            return Ok(true);
        }

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            self.sink
                .append(&format!(
                    "Step {} failed with exit code {code}",
                    step.name
                ))
                .map_err(ExecutorError::Sink)?;
            if !step.continue_on_error {
                return Err(ExecutorError::StepFailed {
                    phase: phase.name.clone(),
                    step: step.name.clone(),
                    code,
                });
            }
        }

        Ok(false)
    }

    /// The record saved for a reboot that could not be issued is rolled
    /// back so no reboot-pending state survives a trigger failure.
    fn restore_after_failed_fire(&self, prior: &StateRecord) {
        if let Err(err) = self.store.save(prior) {
            tracing::error!(error = %err, "Failed to restore state record after trigger failure");
        }
    }
}
