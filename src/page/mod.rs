use crate::finding::{FindingKind, Severity};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one observed page.
///
/// Produced by the page driver; consumed by the worker loop, the loop
/// guard, and (as a compact summary) the coordination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub interactive_elements: Vec<InteractiveElement>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub forms: Vec<PageForm>,
    #[serde(default)]
    pub images: Vec<PageImage>,
    #[serde(default)]
    pub errors: Vec<PageIssue>,
    pub observed_at: i64,
    pub worker_id: u32,
}

/// Dedup identity is (selector, text); `kind` is advisory context for the
/// decision oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub selector: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default)]
    pub text: String,
}

impl Link {
    /// A `javascript:` target or a bare trailing fragment is never a new
    /// destination; whether the link leads away from the *current* URL is
    /// the caller's check.
    pub fn is_navigable(&self) -> bool {
        navigable_target(&self.url)
    }
}

pub fn navigable_target(url: &str) -> bool {
    let trimmed = url.trim();
    !trimmed.is_empty()
        && !trimmed.to_ascii_lowercase().starts_with("javascript:")
        && !trimmed.ends_with('#')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageForm {
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    pub loaded: bool,
}

/// An issue detected at observation time (e.g. a broken image), carried
/// inside the snapshot rather than the driver's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageIssue {
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
}

/// Out-of-band page events collected by the driver between observations
/// and drained synchronously right after each `observe()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    JsError { message: String },
    ConsoleError { message: String },
    HttpError { status: u16, url: String },
}

/// Row handed to the decision oracle as exploration context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub first_visited: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn javascript_and_bare_fragment_links_are_not_navigable() {
        assert!(!navigable_target("javascript:void(0)"));
        assert!(!navigable_target("JavaScript:doThing()"));
        assert!(!navigable_target("https://example.test/page#"));
        assert!(!navigable_target(""));
        assert!(!navigable_target("   "));
    }

    #[test]
    fn ordinary_links_are_navigable() {
        assert!(navigable_target("https://example.test/about"));
        assert!(navigable_target("/relative/path"));
        assert!(navigable_target("https://example.test/docs#section-2"));
    }
}
