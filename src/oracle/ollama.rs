//! Ollama-backed decision oracle.
//!
//! Queries a local Ollama instance's `/api/generate` endpoint and parses
//! the model's reply into a concrete [`Proposal`]. Prompting strategy is
//! private to this implementation; the engine only sees the trait.

use super::{DecisionOracle, OracleError, Proposal};
use crate::action::{Action, ActionKind};
use crate::page::{PageState, PageSummary};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const MAX_PROMPT_ELEMENTS: usize = 15;
const MAX_PROMPT_LINKS: usize = 10;
const MAX_PROMPT_TEXT: usize = 60;

#[derive(Debug, Clone)]
pub struct OllamaOracle {
    endpoint: String,
    model: String,
    timeout: Duration,
    temperature: f32,
    num_predict: u32,
    max_actions: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaOracle {
    pub fn new(settings: &crate::config::OracleSettings, max_actions: u32) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout: settings.timeout(),
            temperature: settings.temperature,
            num_predict: settings.num_predict,
            max_actions,
        }
    }

    fn query(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.endpoint);
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.num_predict,
            },
        });

        let response = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(payload)
            .map_err(|err| self.classify(err))?;

        let body: GenerateResponse = response
            .into_json()
            .map_err(|err| OracleError::Malformed {
                reason: format!("invalid generate response body: {err}"),
            })?;
        Ok(body.response.trim().to_string())
    }

    fn classify(&self, err: ureq::Error) -> OracleError {
        match err {
            ureq::Error::Status(code, _) => OracleError::Unavailable {
                reason: format!("oracle endpoint returned status {code}"),
            },
            ureq::Error::Transport(transport) => {
                if transport_timed_out(&transport) {
                    OracleError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    OracleError::Unavailable {
                        reason: transport.to_string(),
                    }
                }
            }
        }
    }

    fn build_prompt(
        &self,
        state: &PageState,
        recent: &[PageSummary],
        actions_taken: u32,
    ) -> String {
        let recent_urls = if recent.is_empty() {
            "None yet".to_string()
        } else {
            recent
                .iter()
                .map(|page| format!("- {}", page.url))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "You are an autonomous web testing agent exploring a web application \
             to find bugs and test functionality.\n\n\
             Current Page:\nURL: {url}\nTitle: {title}\n\n\
             Recently Explored Pages:\n{recent_urls}\n\n\
             Available Interactive Elements:\n{elements}\n\n\
             Available Links to Explore:\n{links}\n\n\
             Forms on Page: {forms}\n\n\
             Actions taken: {taken}/{budget}\n\n\
             IMPORTANT RULES:\n\
             1. PRIORITIZE UNEXPLORED LINKS - Click links to new pages, not the current page\n\
             2. AVOID repetitive actions - Don't click the same link multiple times\n\
             3. Test forms with various inputs\n\
             4. Look for buttons that trigger actions, not just navigation\n\n\
             Choose the BEST action to discover new functionality and potential bugs.\n\n\
             Respond with ONLY valid JSON (no markdown, no extra text):\n\
             {{\n\
                 \"type\": \"click|fill|navigate|scroll\",\n\
                 \"selector\": \"CSS selector for click/fill\",\n\
                 \"url\": \"full URL for navigate\",\n\
                 \"value\": \"text value for fill action\",\n\
                 \"reasoning\": \"why this action explores new functionality\"\n\
             }}\n\n\
             For navigate actions, ALWAYS include the full URL field.\n\
             If no good actions available, respond: {{\"type\": \"none\"}}\n\n\
             Your JSON response:",
            url = state.url,
            title = state.title,
            recent_urls = recent_urls,
            elements = format_elements(state),
            links = format_links(state),
            forms = state.forms.len(),
            taken = actions_taken,
            budget = self.max_actions,
        )
    }
}

impl DecisionOracle for OllamaOracle {
    fn propose(
        &self,
        state: &PageState,
        recent: &[PageSummary],
        actions_taken: u32,
    ) -> Result<Proposal, OracleError> {
        let prompt = self.build_prompt(state, recent, actions_taken);
        let response = self.query(&prompt)?;
        parse_proposal(&response)
    }
}

/// Extract the first JSON object from the model's reply and turn it into a
/// proposal. A deliberate `{"type":"none"}` is a decline; anything that
/// fails to decode into a well-formed action is malformed — the two cases
/// are deliberately kept apart so oracle malfunctions stay visible.
pub fn parse_proposal(response: &str) -> Result<Proposal, OracleError> {
    let start = response.find('{');
    let end = response.rfind('}');
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(OracleError::Malformed {
                reason: "response contains no JSON object".to_string(),
            })
        }
    };

    let value: serde_json::Value =
        serde_json::from_str(&response[start..=end]).map_err(|err| OracleError::Malformed {
            reason: format!("invalid JSON: {err}"),
        })?;

    if value.get("type").and_then(|t| t.as_str()) == Some("none") {
        return Ok(Proposal::Decline);
    }

    let action: Action =
        serde_json::from_value(value).map_err(|err| OracleError::Malformed {
            reason: format!("not a valid action: {err}"),
        })?;

    match &action.kind {
        ActionKind::Click { selector } | ActionKind::Fill { selector, .. }
            if selector.trim().is_empty() =>
        {
            Err(OracleError::Malformed {
                reason: format!("{} action has an empty selector", action.kind.tag()),
            })
        }
        ActionKind::Navigate { url } if url.trim().is_empty() => Err(OracleError::Malformed {
            reason: "navigate action has an empty url".to_string(),
        }),
        _ => Ok(Proposal::Action(action)),
    }
}

fn transport_timed_out(transport: &ureq::Transport) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn format_elements(state: &PageState) -> String {
    if state.interactive_elements.is_empty() {
        return "None found".to_string();
    }
    state
        .interactive_elements
        .iter()
        .take(MAX_PROMPT_ELEMENTS)
        .enumerate()
        .map(|(idx, element)| {
            format!(
                "{}. [{}] {} - \"{}\"",
                idx + 1,
                element.kind,
                element.selector,
                clip(&element.text),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_links(state: &PageState) -> String {
    if state.links.is_empty() {
        return "None found".to_string();
    }
    state
        .links
        .iter()
        .take(MAX_PROMPT_LINKS)
        .enumerate()
        .map(|(idx, link)| format!("{}. {} - \"{}\"", idx + 1, link.url, clip(&link.text)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_PROMPT_TEXT).collect()
}
