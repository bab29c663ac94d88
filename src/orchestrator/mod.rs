pub mod executor;
pub mod resume;
pub mod sink;
pub mod store;
pub mod trigger;

pub use executor::{PhaseExecutor, REBOOT_COUNT_VAR, REBOOT_REQUEST_PREFIX, RunOutcome};
pub use resume::{Resumption, Run, detect};
pub use sink::LogSink;
pub use store::{FileStateStore, StateRecord, StateStore};
pub use trigger::{CommandRebootTrigger, RebootTrigger};
