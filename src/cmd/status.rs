//! State inspection and maintenance — `baton status`, `list`, `reset`, and
//! the `request-reboot` helper step scripts call to emit the marker line.

use anyhow::Result;
use std::path::PathBuf;

use baton::config::{self, Config};
use baton::orchestrator::{
    FileStateStore, REBOOT_COUNT_VAR, REBOOT_REQUEST_PREFIX, StateStore,
};
use baton::plan::PlanFile;

use crate::Cli;

pub fn show_status(project_dir: PathBuf) -> Result<()> {
    let store = FileStateStore::new(config::state_file_path(&project_dir));

    match store.load()? {
        None => {
            println!("No active run.");
        }
        Some(record) => {
            println!("Run:          {}", record.run_id);
            println!("Next phase:   {}", record.cursor);
            println!("Reboot count: {}", record.reboot_count);
            println!("Plan hash:    {}", record.plan_hash);
            println!("Saved at:     {}", record.saved_at.to_rfc3339());
        }
    }
    Ok(())
}

pub fn list_plan(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    let config = Config::new(
        project_dir,
        cli.verbose,
        cli.plan_file.clone(),
        cli.reboot_cmd.clone(),
    )?;
    let plan = PlanFile::load(&config.plan_file)?;

    println!(
        "Plan '{}' ({} phases)",
        console::style(&plan.name).bold(),
        plan.phases.len()
    );
    for (idx, phase) in plan.phases.iter().enumerate() {
        println!("  {idx}. {}", phase.name);
        for step in &phase.steps {
            println!("       - {}", step.name);
        }
    }
    Ok(())
}

pub fn reset_state(project_dir: PathBuf, force: bool) -> Result<()> {
    let store = FileStateStore::new(config::state_file_path(&project_dir));

    if store.load()?.is_none() {
        println!("Nothing to reset.");
        return Ok(());
    }

    if !force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Delete persisted run state? The run cannot be resumed afterwards")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Reset aborted.");
            return Ok(());
        }
    }

    store.clear()?;
    println!("{} Run state cleared", console::style("✓").green());
    Ok(())
}

/// Print the literal reboot request marker from the `REBOOT_COUNT`
/// environment variable, defaulting to 0 when unset. Step scripts call
/// this instead of carrying the marker format themselves.
pub fn print_reboot_request() {
    let count = std::env::var(REBOOT_COUNT_VAR).unwrap_or_else(|_| "0".to_string());
    println!("{REBOOT_REQUEST_PREFIX}{count}");
}
