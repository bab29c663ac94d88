//! Run resumption: decide FRESH vs RESUMED once at startup.
//!
//! Resumption is entirely state-driven: the orchestrator is invoked with
//! no distinguishing argument after a reboot; the presence of a state
//! record is what re-attaches the new process instance to the logical run.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::ExecutorError;
use crate::orchestrator::store::{StateRecord, StateStore};
use crate::plan::{Phase, PlanFile};

/// One end-to-end execution of an ordered test plan, potentially spanning
/// multiple machine boots.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: Uuid,
    pub plan_name: String,
    pub phases: Vec<Phase>,
    /// Index of the next phase to execute
    pub cursor: usize,
    /// Reboots accepted so far. Monotonically non-decreasing for the
    /// lifetime of the run; reset only by new-run creation.
    pub reboot_count: u32,
    pub plan_hash: String,
}

impl Run {
    /// The durable projection persisted before any reboot.
    pub fn record(&self) -> StateRecord {
        StateRecord {
            run_id: self.id,
            cursor: self.cursor,
            reboot_count: self.reboot_count,
            plan_hash: self.plan_hash.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Phase path used in log lines, e.g. `/smoke/reboot-test`.
    pub fn phase_path(&self, phase: &Phase) -> String {
        format!("/{}/{}", self.plan_name, phase.name)
    }
}

/// Startup decision, made exactly once per process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumption {
    Fresh,
    Resumed,
}

/// Consult the state store and build the run to execute.
///
/// No record means a fresh run: new identity, cursor 0, counter 0. A
/// record re-attaches this instance to the existing run: cursor and
/// counter come from the record and every phase behind the cursor is
/// flagged complete so it is never re-executed. A record whose plan hash
/// differs from the loaded plan is refused; the cursor would be
/// meaningless against a different phase list.
pub fn detect(
    store: &dyn StateStore,
    plan: &PlanFile,
) -> Result<(Run, Resumption), ExecutorError> {
    match store.load()? {
        None => {
            let run = Run {
                id: Uuid::new_v4(),
                plan_name: plan.name.clone(),
                phases: plan.phases.clone(),
                cursor: 0,
                reboot_count: 0,
                plan_hash: plan.plan_hash.clone(),
            };
            tracing::debug!(run_id = %run.id, "Starting fresh run");
            Ok((run, Resumption::Fresh))
        }
        Some(record) => {
            if record.plan_hash != plan.plan_hash {
                return Err(ExecutorError::PlanDrift {
                    run_id: record.run_id,
                });
            }

            let mut phases = plan.phases.clone();
            for phase in phases.iter_mut().take(record.cursor) {
                phase.complete = true;
            }

            let run = Run {
                id: record.run_id,
                plan_name: plan.name.clone(),
                phases,
                cursor: record.cursor,
                reboot_count: record.reboot_count,
                plan_hash: plan.plan_hash.clone(),
            };
            tracing::debug!(
                run_id = %run.id,
                cursor = run.cursor,
                reboot_count = run.reboot_count,
                "Resuming persisted run"
            );
            Ok((run, Resumption::Resumed))
        }
    }
}
