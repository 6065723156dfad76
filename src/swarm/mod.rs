//! Swarm supervisor.
//!
//! Spawns one thread per worker, all sharing a single coordination store,
//! runs them against a wall-clock budget, and aggregates coverage and
//! findings once every worker has stopped. A failure in one worker —
//! including a panic escaping its loop — is collected, never propagated.

use crate::config::Settings;
use crate::driver::PageDriverFactory;
use crate::finding::{Finding, FindingKind, Severity};
use crate::oracle::DecisionOracle;
use crate::shared::ids::generate_run_id;
use crate::shared::time::now_secs;
use crate::store::{CoverageStats, ExplorationStore, StoreError};
use crate::worker::{run_worker, WorkerSummary};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub(crate) enum WorkerEvent {
    Started { worker_id: u32, at: i64 },
    Finished { summary: WorkerSummary, at: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub worker_id: u32,
    pub actions_taken: u32,
    pub pages_visited: usize,
    pub degraded: bool,
    pub error: Option<String>,
}

impl WorkerOutcome {
    fn completed(summary: WorkerSummary) -> Self {
        Self {
            worker_id: summary.worker_id,
            actions_taken: summary.actions_taken,
            pages_visited: summary.pages_visited,
            degraded: summary.degraded,
            error: None,
        }
    }

    fn failed(worker_id: u32, message: String) -> Self {
        Self {
            worker_id,
            actions_taken: 0,
            pages_visited: 0,
            degraded: true,
            error: Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmReport {
    pub run_id: String,
    pub base_url: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub duration_secs: u64,
    pub workers: Vec<WorkerOutcome>,
    pub coverage: CoverageStats,
    pub findings: Vec<Finding>,
}

pub struct Swarm {
    settings: Arc<Settings>,
    store: Arc<ExplorationStore>,
    factory: Arc<dyn PageDriverFactory>,
    oracle: Arc<dyn DecisionOracle>,
}

impl Swarm {
    pub fn new(
        settings: Settings,
        store: Arc<ExplorationStore>,
        factory: Arc<dyn PageDriverFactory>,
        oracle: Arc<dyn DecisionOracle>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            factory,
            oracle,
        }
    }

    /// Run all workers to completion and aggregate. Only the final
    /// aggregation reads can fail; worker failures are folded into the
    /// report.
    pub fn run(&self) -> Result<SwarmReport, StoreError> {
        let started_at = now_secs();
        let run_id = generate_run_id(started_at).unwrap_or_else(|err| {
            warn!(error = %err, "falling back to timestamp-only run id");
            format!("run-{started_at}")
        });
        info!(
            run_id = %run_id,
            workers = self.settings.workers,
            base_url = %self.settings.base_url,
            "starting swarm run"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.settings.duration();
        let started_clock = Instant::now();
        let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();

        let mut handles = Vec::new();
        for worker_id in 0..self.settings.workers {
            let settings = Arc::clone(&self.settings);
            let store = Arc::clone(&self.store);
            let oracle = Arc::clone(&self.oracle);
            let factory = Arc::clone(&self.factory);
            let stop_flag = Arc::clone(&stop);
            let tx = events_tx.clone();

            handles.push((
                worker_id,
                thread::spawn(move || {
                    let _ = tx.send(WorkerEvent::Started {
                        worker_id,
                        at: now_secs(),
                    });
                    let summary = run_worker(
                        worker_id,
                        settings,
                        store,
                        oracle,
                        factory.as_ref(),
                        deadline,
                        &stop_flag,
                    );
                    let _ = tx.send(WorkerEvent::Finished {
                        summary,
                        at: now_secs(),
                    });
                }),
            ));
        }
        drop(events_tx);

        // Workers watch the deadline themselves; the stop flag is the
        // backstop signal once the budget elapses.
        let mut outcomes = Vec::new();
        loop {
            if Instant::now() >= deadline {
                stop.store(true, Ordering::Relaxed);
            }
            match events_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(WorkerEvent::Started { worker_id, at }) => {
                    info!(worker_id, at, "worker started");
                }
                Ok(WorkerEvent::Finished { summary, at }) => {
                    info!(
                        worker_id = summary.worker_id,
                        actions = summary.actions_taken,
                        degraded = summary.degraded,
                        at,
                        "worker finished"
                    );
                    outcomes.push(WorkerOutcome::completed(summary));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for (worker_id, handle) in handles {
            match handle.join() {
                Ok(()) => {}
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(worker_id, message = %message, "worker panicked");
                    let finding = Finding::new(
                        FindingKind::AgentError,
                        Severity::Medium,
                        format!("worker terminated abnormally: {message}"),
                        self.settings.base_url.clone(),
                        worker_id,
                    );
                    if let Err(err) = self.store.add_finding(&finding) {
                        warn!(worker_id, error = %err, "finding not recorded");
                    }
                    outcomes.push(WorkerOutcome::failed(worker_id, message));
                }
            }
        }

        self.aggregate(run_id, started_at, started_clock, outcomes)
    }

    /// Read-only aggregation pass; runs strictly after all workers have
    /// stopped, so it cannot race with the write path.
    fn aggregate(
        &self,
        run_id: String,
        started_at: i64,
        started_clock: Instant,
        mut outcomes: Vec<WorkerOutcome>,
    ) -> Result<SwarmReport, StoreError> {
        let coverage = self.store.coverage_stats()?;
        let findings = self.store.all_findings()?;
        outcomes.sort_by_key(|outcome| outcome.worker_id);

        info!(
            run_id = %run_id,
            pages = coverage.pages_explored,
            actions = coverage.actions_executed,
            findings = coverage.findings_count,
            "swarm run aggregated"
        );

        Ok(SwarmReport {
            run_id,
            base_url: self.settings.base_url.clone(),
            started_at,
            finished_at: now_secs(),
            duration_secs: started_clock.elapsed().as_secs(),
            workers: outcomes,
            coverage,
            findings,
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
