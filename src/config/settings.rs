use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Swarm-wide settings, loaded once and shared read-only by every worker.
///
/// The stuck and loop thresholds are tunables rather than constants: the
/// shipped defaults are empirical, not structural.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub base_url: String,
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_max_actions")]
    pub max_actions_per_worker: u32,
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
    #[serde(default = "default_recovery_pause_ms")]
    pub recovery_pause_ms: u64,
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default = "default_loop_repeat_threshold")]
    pub loop_repeat_threshold: usize,
    #[serde(default = "default_tracked_actions_cap")]
    pub tracked_actions_cap: usize,
    #[serde(default = "default_recent_pages_limit")]
    pub recent_pages_limit: usize,
    #[serde(default)]
    pub oracle: OracleSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSettings {
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_oracle_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_oracle_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_oracle_temperature")]
    pub temperature: f32,
    #[serde(default = "default_oracle_num_predict")]
    pub num_predict: u32,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
            timeout_secs: default_oracle_timeout_secs(),
            max_retries: default_oracle_max_retries(),
            retry_backoff_ms: default_oracle_retry_backoff_ms(),
            temperature: default_oracle_temperature(),
            num_predict: default_oracle_num_predict(),
        }
    }
}

fn default_workers() -> u32 {
    5
}

fn default_duration_secs() -> u64 {
    1800
}

fn default_max_actions() -> u32 {
    50
}

fn default_action_delay_ms() -> u64 {
    500
}

fn default_recovery_pause_ms() -> u64 {
    2000
}

fn default_stuck_threshold() -> u32 {
    5
}

fn default_loop_window() -> usize {
    5
}

fn default_loop_repeat_threshold() -> usize {
    3
}

fn default_tracked_actions_cap() -> usize {
    10
}

fn default_recent_pages_limit() -> usize {
    10
}

fn default_oracle_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_oracle_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_oracle_max_retries() -> u32 {
    3
}

fn default_oracle_retry_backoff_ms() -> u64 {
    1000
}

fn default_oracle_temperature() -> f32 {
    0.4
}

fn default_oracle_num_predict() -> u32 {
    500
}

impl Settings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            workers: default_workers(),
            duration_secs: default_duration_secs(),
            max_actions_per_worker: default_max_actions(),
            action_delay_ms: default_action_delay_ms(),
            recovery_pause_ms: default_recovery_pause_ms(),
            stuck_threshold: default_stuck_threshold(),
            loop_window: default_loop_window(),
            loop_repeat_threshold: default_loop_repeat_threshold(),
            tracked_actions_cap: default_tracked_actions_cap(),
            recent_pages_limit: default_recent_pages_limit(),
            oracle: OracleSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must be non-empty".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.loop_window == 0 || self.loop_repeat_threshold == 0 {
            return Err(ConfigError::Invalid(
                "loop_window and loop_repeat_threshold must be at least 1".into(),
            ));
        }
        if self.loop_window > self.tracked_actions_cap {
            return Err(ConfigError::Invalid(format!(
                "loop_window ({}) cannot exceed tracked_actions_cap ({})",
                self.loop_window, self.tracked_actions_cap
            )));
        }
        if self.loop_repeat_threshold > self.loop_window {
            return Err(ConfigError::Invalid(format!(
                "loop_repeat_threshold ({}) cannot exceed loop_window ({})",
                self.loop_repeat_threshold, self.loop_window
            )));
        }
        if self.oracle.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "oracle.max_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn recovery_pause(&self) -> Duration {
        Duration::from_millis(self.recovery_pause_ms)
    }
}

impl OracleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings: Settings =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}
