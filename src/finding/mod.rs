use crate::shared::time::now_secs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    JavascriptError,
    ConsoleError,
    HttpError,
    BrokenImage,
    ActionFailure,
    AgentError,
    OracleError,
}

impl FindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JavascriptError => "javascript_error",
            Self::ConsoleError => "console_error",
            Self::HttpError => "http_error",
            Self::BrokenImage => "broken_image",
            Self::ActionFailure => "action_failure",
            Self::AgentError => "agent_error",
            Self::OracleError => "oracle_error",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "javascript_error" => Ok(Self::JavascriptError),
            "console_error" => Ok(Self::ConsoleError),
            "http_error" => Ok(Self::HttpError),
            "broken_image" => Ok(Self::BrokenImage),
            "action_failure" => Ok(Self::ActionFailure),
            "agent_error" => Ok(Self::AgentError),
            "oracle_error" => Ok(Self::OracleError),
            other => Err(format!("unknown finding kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity `{other}`")),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed issue. Append-only: once recorded in the coordination
/// store a finding is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    pub url: String,
    pub worker_id: u32,
    pub recorded_at: i64,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        message: impl Into<String>,
        url: impl Into<String>,
        worker_id: u32,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            url: url.into(),
            worker_id,
            recorded_at: now_secs(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
