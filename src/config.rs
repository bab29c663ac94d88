use anyhow::{Context, Result, anyhow};
use glob::glob;
use std::path::{Path, PathBuf};

/// The name of the baton configuration directory.
pub const BATON_DIR: &str = ".baton";

/// Reboot command used when neither the CLI flag nor `BATON_REBOOT_CMD`
/// provides one.
pub const DEFAULT_REBOOT_CMD: &str = "systemctl reboot";

/// Path of the state record for a project, without requiring a full
/// `Config` (status and reset do not need a plan file to exist).
pub fn state_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BATON_DIR).join("state.json")
}

/// Runtime configuration for baton.
///
/// Resolves the `.baton/` path layout and handles plan file discovery.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub plan_file: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub reboot_cmd: String,
    pub verbose: bool,
}

impl Config {
    pub fn new(
        project_dir: PathBuf,
        verbose: bool,
        plan_file: Option<PathBuf>,
        reboot_cmd: Option<String>,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let plan_file = match plan_file {
            Some(path) => path
                .canonicalize()
                .context("Failed to resolve plan file path")?,
            None => Self::find_plan_file(&project_dir)?,
        };

        let baton_dir = project_dir.join(BATON_DIR);
        let state_file = baton_dir.join("state.json");
        let log_dir = baton_dir.join("logs");
        let log_file = log_dir.join("run.log");

        let reboot_cmd = reboot_cmd
            .or_else(|| std::env::var("BATON_REBOOT_CMD").ok())
            .unwrap_or_else(|| DEFAULT_REBOOT_CMD.to_string());

        Ok(Self {
            project_dir,
            plan_file,
            state_file,
            log_dir,
            log_file,
            reboot_cmd,
            verbose,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.project_dir.join(BATON_DIR))
            .context("Failed to create baton directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Find a plan file, checking .baton/plan.json first, then plans/*plan*.json.
    /// Returns the most recently modified plan file if multiple are found.
    fn find_plan_file(project_dir: &Path) -> Result<PathBuf> {
        let baton_plan = project_dir.join(BATON_DIR).join("plan.json");
        if baton_plan.exists() {
            return Ok(baton_plan);
        }

        let pattern = project_dir
            .join("plans/*plan*.json")
            .to_string_lossy()
            .to_string();

        let mut plan_files: Vec<PathBuf> = glob(&pattern)
            .context("Failed to read glob pattern")?
            .filter_map(|entry| entry.ok())
            .collect();

        if plan_files.is_empty() {
            return Err(anyhow!(
                "No plan file found. Create .baton/plan.json or provide --plan-file"
            ));
        }

        // Sort by modification time (most recent first)
        plan_files.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(plan_files.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup_plan_file(dir: &Path) -> PathBuf {
        let baton_dir = dir.join(BATON_DIR);
        fs::create_dir_all(&baton_dir).unwrap();
        let plan_file = baton_dir.join("plan.json");
        fs::write(&plan_file, r#"{"name": "t", "phases": []}"#).unwrap();
        plan_file
    }

    #[test]
    fn test_config_new_with_explicit_plan() {
        let dir = tempdir().unwrap();
        let plan_file = setup_plan_file(dir.path());
        let config =
            Config::new(dir.path().to_path_buf(), true, Some(plan_file.clone()), None).unwrap();
        assert!(config.verbose);
        assert_eq!(config.plan_file, plan_file.canonicalize().unwrap());
        assert_eq!(
            config.state_file,
            dir.path()
                .canonicalize()
                .unwrap()
                .join(".baton/state.json")
        );
    }

    #[test]
    fn test_config_log_file_in_baton_directory() {
        let dir = tempdir().unwrap();
        setup_plan_file(dir.path());
        let config = Config::new(dir.path().to_path_buf(), false, None, None).unwrap();
        assert_eq!(
            config.log_file,
            dir.path()
                .canonicalize()
                .unwrap()
                .join(".baton/logs/run.log")
        );
    }

    #[test]
    fn test_config_new_with_auto_discovery() {
        let dir = tempdir().unwrap();
        let plan_file = setup_plan_file(dir.path());
        let config = Config::new(dir.path().to_path_buf(), true, None, None).unwrap();
        assert_eq!(config.plan_file, plan_file.canonicalize().unwrap());
    }

    #[test]
    fn test_config_discovery_falls_back_to_plans_glob() {
        let dir = tempdir().unwrap();
        let plans_dir = dir.path().join("plans");
        fs::create_dir_all(&plans_dir).unwrap();
        let plan_file = plans_dir.join("smoke-plan.json");
        fs::write(&plan_file, r#"{"name": "t", "phases": []}"#).unwrap();

        let config = Config::new(dir.path().to_path_buf(), false, None, None).unwrap();
        assert_eq!(config.plan_file, plan_file.canonicalize().unwrap());
    }

    #[test]
    fn test_config_new_no_plan_file_error() {
        let dir = tempdir().unwrap();
        let result = Config::new(dir.path().to_path_buf(), true, None, None);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("No plan file found")
        );
    }

    #[test]
    fn test_reboot_cmd_cli_override() {
        let dir = tempdir().unwrap();
        setup_plan_file(dir.path());
        let config = Config::new(
            dir.path().to_path_buf(),
            false,
            None,
            Some("shutdown -r now".to_string()),
        )
        .unwrap();
        assert_eq!(config.reboot_cmd, "shutdown -r now");
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        setup_plan_file(dir.path());
        let config = Config::new(dir.path().to_path_buf(), false, None, None).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.log_dir.exists());
    }

    #[test]
    fn test_state_file_path_helper_matches_config() {
        let dir = tempdir().unwrap();
        setup_plan_file(dir.path());
        let config = Config::new(dir.path().to_path_buf(), false, None, None).unwrap();
        assert_eq!(
            state_file_path(&config.project_dir),
            config.state_file
        );
    }
}
