//! Per-worker exploration state machine.
//!
//! One worker owns one exclusive page session and cycles through
//! observe -> decide -> act until its budgets run out. Errors are contained
//! at the smallest possible scope: a failed action costs one finding, a
//! failed iteration costs one finding and a pause, and only a session that
//! cannot even be constructed ends a worker early.

use crate::action::Action;
use crate::config::Settings;
use crate::driver::{DriverError, PageDriver, PageDriverFactory};
use crate::finding::{Finding, FindingKind, Severity};
use crate::fingerprint::{action_fingerprint, element_fingerprint, page_fingerprint};
use crate::guard::LoopGuard;
use crate::oracle::{propose_with_retry, DecisionOracle, OracleError, Proposal};
use crate::page::{PageEvent, PageState};
use crate::store::ExplorationStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: u32,
    pub actions_taken: u32,
    pub pages_visited: usize,
    pub degraded: bool,
}

/// Run one worker to completion. A session that cannot be constructed
/// produces a degraded summary (zero actions, one agent-error finding)
/// instead of an error, so the rest of the swarm is unaffected.
pub fn run_worker(
    worker_id: u32,
    settings: Arc<Settings>,
    store: Arc<ExplorationStore>,
    oracle: Arc<dyn DecisionOracle>,
    factory: &dyn PageDriverFactory,
    deadline: Instant,
    stop: &AtomicBool,
) -> WorkerSummary {
    match factory.create_session(worker_id) {
        Ok(driver) => {
            let worker = ExplorerWorker::new(worker_id, settings, store, oracle, driver);
            worker.explore(deadline, stop)
        }
        Err(err) => {
            warn!(worker_id, error = %err, "page session construction failed");
            let finding = Finding::new(
                FindingKind::AgentError,
                Severity::High,
                format!("worker could not start a page session: {err}"),
                settings.base_url.clone(),
                worker_id,
            );
            if let Err(store_err) = store.add_finding(&finding) {
                warn!(worker_id, error = %store_err, "finding not recorded");
            }
            WorkerSummary {
                worker_id,
                actions_taken: 0,
                pages_visited: 0,
                degraded: true,
            }
        }
    }
}

pub struct ExplorerWorker {
    worker_id: u32,
    settings: Arc<Settings>,
    store: Arc<ExplorationStore>,
    oracle: Arc<dyn DecisionOracle>,
    guard: LoopGuard,
    driver: Box<dyn PageDriver>,
    actions_taken: u32,
    visited_urls: HashSet<String>,
    current_url: String,
    stuck_counter: u32,
}

impl ExplorerWorker {
    pub fn new(
        worker_id: u32,
        settings: Arc<Settings>,
        store: Arc<ExplorationStore>,
        oracle: Arc<dyn DecisionOracle>,
        driver: Box<dyn PageDriver>,
    ) -> Self {
        let guard = LoopGuard::from_settings(&settings);
        Self {
            worker_id,
            settings,
            store,
            oracle,
            guard,
            driver,
            actions_taken: 0,
            visited_urls: HashSet::new(),
            current_url: String::new(),
            stuck_counter: 0,
        }
    }

    /// Drive the exploration loop until the deadline, the action budget,
    /// or the swarm stop flag ends it. The page session is released on
    /// every exit path.
    pub fn explore(mut self, deadline: Instant, stop: &AtomicBool) -> WorkerSummary {
        info!(worker_id = self.worker_id, "starting exploration");

        if let Err(err) = self
            .driver
            .perform(&Action::navigate(self.settings.base_url.clone()))
        {
            self.record_finding(Finding::new(
                FindingKind::AgentError,
                Severity::Medium,
                format!("initial navigation failed: {err}"),
                self.settings.base_url.clone(),
                self.worker_id,
            ));
        }
        self.current_url = self.driver.current_url();

        while Instant::now() < deadline
            && self.actions_taken < self.settings.max_actions_per_worker
            && !stop.load(Ordering::Relaxed)
        {
            if let Err(err) = self.iterate(stop) {
                let url = self.driver.current_url();
                warn!(worker_id = self.worker_id, error = %err, "iteration failed");
                self.record_finding(Finding::new(
                    FindingKind::AgentError,
                    Severity::Medium,
                    err.to_string(),
                    url,
                    self.worker_id,
                ));
                sleep_with_stop(stop, self.settings.recovery_pause());
            }
        }

        self.driver.close();
        info!(
            worker_id = self.worker_id,
            actions = self.actions_taken,
            pages = self.visited_urls.len(),
            "exploration completed"
        );

        WorkerSummary {
            worker_id: self.worker_id,
            actions_taken: self.actions_taken,
            pages_visited: self.visited_urls.len(),
            degraded: false,
        }
    }

    /// One observe -> decide -> act cycle. Driver failures propagate to the
    /// iteration boundary; everything else is handled in place.
    fn iterate(&mut self, stop: &AtomicBool) -> Result<(), DriverError> {
        let state = self.driver.observe(self.worker_id)?;
        self.harvest_issues(&state);

        self.visited_urls.insert(state.url.clone());
        if state.url == self.current_url {
            self.stuck_counter += 1;
        } else {
            self.stuck_counter = 0;
            self.current_url = state.url.clone();
        }

        let action = if self.stuck_counter >= self.settings.stuck_threshold {
            warn!(
                worker_id = self.worker_id,
                url = %self.current_url,
                cycles = self.stuck_counter,
                "url unchanged, forcing recovery"
            );
            let recovery = self.stuck_recovery_action(&state);
            self.stuck_counter = 0;
            Some(recovery)
        } else {
            let fingerprint = page_fingerprint(&state.url, &state.title);
            if self.page_already_explored(&fingerprint) {
                match self.unexplored_action(&state) {
                    Some(action) => Some(action),
                    None => self.decide(&state),
                }
            } else {
                self.record_page(&fingerprint, &state);
                self.decide(&state)
            }
        };

        match action {
            Some(action) => {
                self.execute(&action);
                sleep_with_stop(stop, self.settings.action_delay());
            }
            None => self.backtrack(),
        }
        Ok(())
    }

    /// Stuck recovery: any link that leads away from the current URL and is
    /// not a `javascript:` target, otherwise go back.
    fn stuck_recovery_action(&self, state: &PageState) -> Action {
        for link in &state.links {
            let url = link.url.trim();
            if !url.is_empty()
                && url != self.current_url
                && !url.to_ascii_lowercase().starts_with("javascript:")
            {
                return Action::navigate(url.to_string()).with_reasoning("breaking stuck state");
            }
        }
        Action::back().with_reasoning("going back to escape stuck state")
    }

    /// Lookahead on an already-explored page: a link this worker has never
    /// visited, then an element nobody in the swarm has tried.
    fn unexplored_action(&self, state: &PageState) -> Option<Action> {
        for link in &state.links {
            if link.is_navigable() && !self.visited_urls.contains(&link.url) {
                return Some(Action::navigate(link.url.clone()));
            }
        }

        for element in &state.interactive_elements {
            let fingerprint = element_fingerprint(&element.selector, &element.text);
            if !self.action_already_explored(&fingerprint) {
                return Some(Action::click(element.selector.clone()));
            }
        }

        None
    }

    /// The Deciding step: loop check first, then the oracle, then the
    /// fallback cascade. Returns `None` only when the oracle explicitly
    /// declined and the page offers no element or link candidate.
    fn decide(&mut self, state: &PageState) -> Option<Action> {
        if self.guard.is_looping() {
            warn!(
                worker_id = self.worker_id,
                "repetition loop detected, synthesizing fallback"
            );
            let action = self.guard.fallback_action(state);
            self.guard.track(&action);
            return Some(action);
        }

        let recent = match self.store.recent_explored_pages(self.settings.recent_pages_limit) {
            Ok(recent) => recent,
            Err(err) => {
                warn!(worker_id = self.worker_id, error = %err, "recent pages unavailable");
                Vec::new()
            }
        };

        let proposal = propose_with_retry(
            self.oracle.as_ref(),
            state,
            &recent,
            self.actions_taken,
            self.settings.oracle.max_retries,
            self.settings.oracle.retry_backoff(),
        );

        let action = match proposal {
            Ok(Proposal::Action(action)) => Some(action),
            Ok(Proposal::Decline) => {
                debug!(worker_id = self.worker_id, "oracle declined to act");
                self.guard.fallback_candidate(state)
            }
            Err(OracleError::Malformed { reason }) => {
                self.record_finding(
                    Finding::new(
                        FindingKind::OracleError,
                        Severity::Low,
                        format!("oracle produced an unusable response: {reason}"),
                        state.url.clone(),
                        self.worker_id,
                    )
                    .with_details(json!({ "reason": reason })),
                );
                Some(self.guard.fallback_action(state))
            }
            Err(err) => {
                warn!(worker_id = self.worker_id, error = %err, "oracle produced no action");
                Some(self.guard.fallback_action(state))
            }
        };

        if let Some(action) = &action {
            self.guard.track(action);
        }
        action
    }

    /// Act, then record the fingerprint; a failed action costs one low
    /// severity finding and nothing else.
    fn execute(&mut self, action: &Action) {
        debug!(worker_id = self.worker_id, action = %action, "executing");
        match self.driver.perform(action) {
            Ok(()) => {
                let fingerprint = action_fingerprint(action);
                if let Err(err) =
                    self.store
                        .record_action_explored(&fingerprint, action, self.worker_id)
                {
                    warn!(worker_id = self.worker_id, error = %err, "action not recorded");
                }
            }
            Err(err) => {
                let url = self.driver.current_url();
                self.record_finding(
                    Finding::new(
                        FindingKind::ActionFailure,
                        Severity::Low,
                        format!("failed to execute {action}: {err}"),
                        url,
                        self.worker_id,
                    )
                    .with_details(json!({ "action": action, "error": err.to_string() })),
                );
            }
        }
        self.actions_taken += 1;
    }

    /// Recovery step when there is nothing to do here: step back if this
    /// session has somewhere to go back to, otherwise return to the start
    /// page. Not counted against the action budget.
    fn backtrack(&mut self) {
        debug!(worker_id = self.worker_id, "no viable action, backtracking");
        let action = if self.visited_urls.len() > 1 {
            Action::back()
        } else {
            Action::navigate(self.settings.base_url.clone())
        };
        if let Err(err) = self.driver.perform(&action) {
            debug!(worker_id = self.worker_id, error = %err, "backtrack failed");
        }
    }

    /// Convert the driver's drained event stream plus observation-time
    /// issues into findings.
    fn harvest_issues(&mut self, state: &PageState) {
        for event in self.driver.drain_events() {
            let finding = match event {
                PageEvent::JsError { message } => Finding::new(
                    FindingKind::JavascriptError,
                    Severity::High,
                    message,
                    state.url.clone(),
                    self.worker_id,
                ),
                PageEvent::ConsoleError { message } => Finding::new(
                    FindingKind::ConsoleError,
                    Severity::Medium,
                    message,
                    state.url.clone(),
                    self.worker_id,
                ),
                PageEvent::HttpError { status, url } => Finding::new(
                    FindingKind::HttpError,
                    if status >= 500 {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    format!("HTTP {status} - {url}"),
                    state.url.clone(),
                    self.worker_id,
                )
                .with_details(json!({ "status": status })),
            };
            self.record_finding(finding);
        }

        for issue in &state.errors {
            self.record_finding(Finding::new(
                issue.kind,
                issue.severity,
                issue.message.clone(),
                state.url.clone(),
                self.worker_id,
            ));
        }
    }

    fn page_already_explored(&self, fingerprint: &str) -> bool {
        match self.store.has_explored_page(fingerprint) {
            Ok(explored) => explored,
            Err(err) => {
                warn!(worker_id = self.worker_id, error = %err, "page lookup failed");
                false
            }
        }
    }

    fn action_already_explored(&self, fingerprint: &str) -> bool {
        match self.store.has_explored_action(fingerprint) {
            Ok(explored) => explored,
            Err(err) => {
                warn!(worker_id = self.worker_id, error = %err, "action lookup failed");
                false
            }
        }
    }

    fn record_page(&self, fingerprint: &str, state: &PageState) {
        if let Err(err) = self.store.record_page_explored(fingerprint, state) {
            warn!(worker_id = self.worker_id, error = %err, "page not recorded");
        }
    }

    fn record_finding(&self, finding: Finding) {
        warn!(
            worker_id = self.worker_id,
            severity = %finding.severity,
            message = %finding.message,
            "finding recorded"
        );
        if let Err(err) = self.store.add_finding(&finding) {
            warn!(worker_id = self.worker_id, error = %err, "finding not recorded");
        }
    }
}

/// Sleep in small steps so a raised stop flag cuts the wait short.
pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(25));
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}
