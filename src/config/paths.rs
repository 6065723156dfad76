use super::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem layout of one run's durable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.root.clone(), self.reports_dir()]
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("exploration.db")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn run_report_path(&self, run_id: &str) -> PathBuf {
        self.reports_dir().join(format!("{run_id}.json"))
    }
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), ConfigError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

pub fn default_state_root_path(base: &Path) -> PathBuf {
    base.join("swarm-results")
}
