//! Run orchestration — `baton run`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::Cli;

pub async fn run_plan(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    use baton::config::Config;
    use baton::orchestrator::{
        CommandRebootTrigger, FileStateStore, LogSink, PhaseExecutor, Resumption, RunOutcome,
        detect,
    };
    use baton::plan::PlanFile;

    let config = Config::new(
        project_dir,
        cli.verbose,
        cli.plan_file.clone(),
        cli.reboot_cmd.clone(),
    )?;
    config.ensure_directories()?;

    let plan = PlanFile::load(&config.plan_file)?;
    let store = FileStateStore::new(config.state_file.clone());
    let trigger = CommandRebootTrigger::new(config.reboot_cmd.clone());
    let mut sink = LogSink::open(&config.log_file, true).with_context(|| {
        format!("Failed to open run log at {}", config.log_file.display())
    })?;

    let (mut run, resumption) = match detect(&store, &plan) {
        Ok(detected) => detected,
        Err(err) => {
            // Errors surface to the log before exit; the sink is the record
            // external assertions inspect.
            let _ = sink.append(&format!("ERROR: {err}"));
            return Err(err.into());
        }
    };

    match resumption {
        Resumption::Fresh => {
            if cli.verbose {
                println!(
                    "  {} run {} ({} phases)",
                    console::style("Starting").green(),
                    run.id,
                    run.phases.len()
                );
            }
        }
        Resumption::Resumed => {
            if cli.verbose {
                println!(
                    "  {} run {} at phase {}/{}, reboot count {}",
                    console::style("Resuming").cyan(),
                    run.id,
                    run.cursor,
                    run.phases.len(),
                    run.reboot_count
                );
            }
        }
    }

    let mut executor = PhaseExecutor::new(&store, &trigger, &mut sink);
    match executor.execute(&mut run).await {
        Ok(RunOutcome::Completed) => {
            println!(
                "{} Run complete ({} phases)",
                console::style("✓").green(),
                run.phases.len()
            );
            Ok(())
        }
        Ok(RunOutcome::RebootIssued) => {
            // Only reachable with a trigger double; the real trigger parks
            // until the OS terminates the process.
            Ok(())
        }
        Err(err) => {
            let _ = sink.append(&format!("ERROR: {err}"));
            Err(err.into())
        }
    }
}
