use serde::{Deserialize, Serialize};

/// One concrete step a worker can ask its page driver to perform.
///
/// Serialized with a `type` tag so the wire form matches what the decision
/// oracle is asked to produce: `{"type":"click","selector":"#nav"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Click { selector: String },
    Fill { selector: String, value: String },
    Navigate { url: String },
    Scroll,
    Back,
}

impl ActionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Navigate { .. } => "navigate",
            Self::Scroll => "scroll",
            Self::Back => "back",
        }
    }
}

/// An action plus an optional free-text rationale.
///
/// `reasoning` is diagnostic only: it never participates in equality or
/// fingerprinting, so the same action proposed twice with different prose
/// deduplicates to one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Action {}

impl Action {
    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Click {
                selector: selector.into(),
            },
            reasoning: None,
        }
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Fill {
                selector: selector.into(),
                value: value.into(),
            },
            reasoning: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Navigate { url: url.into() },
            reasoning: None,
        }
    }

    pub fn scroll() -> Self {
        Self {
            kind: ActionKind::Scroll,
            reasoning: None,
        }
    }

    pub fn back() -> Self {
        Self {
            kind: ActionKind::Back,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn selector(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Click { selector } | ActionKind::Fill { selector, .. } => Some(selector),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Navigate { url } => Some(url),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ActionKind::Click { selector } => write!(f, "click {selector}"),
            ActionKind::Fill { selector, .. } => write!(f, "fill {selector}"),
            ActionKind::Navigate { url } => write!(f, "navigate {url}"),
            ActionKind::Scroll => write!(f, "scroll"),
            ActionKind::Back => write!(f, "back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_is_excluded_from_equality() {
        let bare = Action::click("#submit");
        let explained = Action::click("#submit").with_reasoning("form looks untested");
        assert_eq!(bare, explained);
    }

    #[test]
    fn serializes_with_type_tag() {
        let action = Action::navigate("https://example.test/about");
        let value = serde_json::to_value(&action).expect("serialize");
        assert_eq!(value["type"], "navigate");
        assert_eq!(value["url"], "https://example.test/about");
        assert!(value.get("reasoning").is_none());
    }

    #[test]
    fn deserializes_oracle_wire_form() {
        let action: Action =
            serde_json::from_str(r##"{"type":"fill","selector":"#q","value":"test","reasoning":"search"}"##)
                .expect("deserialize");
        assert_eq!(action.kind.tag(), "fill");
        assert_eq!(action.selector(), Some("#q"));
        assert_eq!(action.reasoning.as_deref(), Some("search"));
    }
}
