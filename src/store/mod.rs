//! Shared coordination store.
//!
//! One SQLite database holds three independent record sets: explored pages,
//! explored actions, and findings. Every worker holds a handle to the same
//! store; each call opens its own WAL connection so no connection is ever
//! shared across threads. All mutations are single-statement
//! `INSERT ... ON CONFLICT` forms, which makes the first-insert-wins
//! semantics linearizable per fingerprint.

use crate::action::Action;
use crate::finding::{Finding, FindingKind, Severity};
use crate::page::{PageState, PageSummary};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create store parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to encode record: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid finding kind `{value}` in database")]
    InvalidFindingKind { value: String },
    #[error("invalid severity `{value}` in database")]
    InvalidSeverity { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    AlreadyRecorded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub pages_explored: u64,
    pub actions_executed: u64,
    pub findings_count: u64,
    pub unique_urls: u64,
}

pub struct ExplorationStore {
    db_path: PathBuf,
}

impl ExplorationStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };

        // Ensure open is valid now to fail fast.
        let _ = store.connect()?;
        Ok(store)
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS explored_pages (
                    page_fingerprint TEXT PRIMARY KEY,
                    url TEXT NOT NULL,
                    title TEXT NOT NULL,
                    summary_json TEXT NOT NULL,
                    first_visited INTEGER NOT NULL,
                    visit_count INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS explored_actions (
                    action_fingerprint TEXT PRIMARY KEY,
                    action_json TEXT NOT NULL,
                    worker_id INTEGER NOT NULL,
                    executed_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS findings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    severity TEXT NOT NULL,
                    message TEXT NOT NULL,
                    url TEXT NOT NULL,
                    worker_id INTEGER NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    details_json TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_explored_pages_first_visited
                    ON explored_pages(first_visited DESC);
                CREATE INDEX IF NOT EXISTS idx_findings_recorded
                    ON findings(recorded_at DESC);
                ",
            )
            .map_err(|source| StoreError::Sql { source })?;
        Ok(())
    }

    pub fn has_explored_page(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let connection = self.connect()?;
        let exists = connection
            .query_row(
                "SELECT 1 FROM explored_pages WHERE page_fingerprint = ?1 LIMIT 1",
                params![fingerprint],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|source| StoreError::Sql { source })?
            .is_some();
        Ok(exists)
    }

    /// Idempotent upsert: a repeat observation bumps the visit counter and
    /// never overwrites the first recorder's snapshot or timestamp.
    pub fn record_page_explored(
        &self,
        fingerprint: &str,
        state: &PageState,
    ) -> Result<RecordOutcome, StoreError> {
        let summary =
            serde_json::to_string(state).map_err(|source| StoreError::Encode { source })?;
        let connection = self.connect()?;
        let visits: i64 = connection
            .query_row(
                "
                INSERT INTO explored_pages (
                    page_fingerprint, url, title, summary_json, first_visited
                ) VALUES (?1, ?2, ?3, ?4, strftime('%s','now'))
                ON CONFLICT(page_fingerprint)
                    DO UPDATE SET visit_count = visit_count + 1
                RETURNING visit_count
                ",
                params![fingerprint, state.url, state.title, summary],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Sql { source })?;

        if visits == 1 {
            Ok(RecordOutcome::Inserted)
        } else {
            Ok(RecordOutcome::AlreadyRecorded)
        }
    }

    pub fn has_explored_action(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let connection = self.connect()?;
        let exists = connection
            .query_row(
                "SELECT 1 FROM explored_actions WHERE action_fingerprint = ?1 LIMIT 1",
                params![fingerprint],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|source| StoreError::Sql { source })?
            .is_some();
        Ok(exists)
    }

    /// Insert-if-absent: the first recorder wins and later duplicates are
    /// silent no-ops, so a fingerprint's attribution never changes.
    pub fn record_action_explored(
        &self,
        fingerprint: &str,
        action: &Action,
        worker_id: u32,
    ) -> Result<RecordOutcome, StoreError> {
        let encoded =
            serde_json::to_string(action).map_err(|source| StoreError::Encode { source })?;
        let connection = self.connect()?;
        let inserted = connection
            .execute(
                "
                INSERT INTO explored_actions (
                    action_fingerprint, action_json, worker_id, executed_at
                ) VALUES (?1, ?2, ?3, strftime('%s','now'))
                ON CONFLICT(action_fingerprint) DO NOTHING
                ",
                params![fingerprint, encoded, worker_id],
            )
            .map_err(|source| StoreError::Sql { source })?;

        if inserted == 1 {
            Ok(RecordOutcome::Inserted)
        } else {
            Ok(RecordOutcome::AlreadyRecorded)
        }
    }

    pub fn add_finding(&self, finding: &Finding) -> Result<(), StoreError> {
        let details = if finding.details.is_null() {
            None
        } else {
            Some(
                serde_json::to_string(&finding.details)
                    .map_err(|source| StoreError::Encode { source })?,
            )
        };
        let connection = self.connect()?;
        connection
            .execute(
                "
                INSERT INTO findings (
                    kind, severity, message, url, worker_id, recorded_at, details_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    finding.kind.as_str(),
                    finding.severity.as_str(),
                    finding.message,
                    finding.url,
                    finding.worker_id,
                    finding.recorded_at,
                    details,
                ],
            )
            .map_err(|source| StoreError::Sql { source })?;
        Ok(())
    }

    /// Most-recent-first context rows for the decision oracle.
    pub fn recent_explored_pages(&self, limit: usize) -> Result<Vec<PageSummary>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "
                SELECT url, title, first_visited
                FROM explored_pages
                ORDER BY first_visited DESC, rowid DESC
                LIMIT ?1
                ",
            )
            .map_err(|source| StoreError::Sql { source })?;

        let rows = statement
            .query_map(params![limit as i64], |row| {
                Ok(PageSummary {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    first_visited: row.get(2)?,
                })
            })
            .map_err(|source| StoreError::Sql { source })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|source| StoreError::Sql { source })?);
        }
        Ok(out)
    }

    pub fn all_findings(&self) -> Result<Vec<Finding>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "
                SELECT kind, severity, message, url, worker_id, recorded_at, details_json
                FROM findings
                ORDER BY recorded_at DESC, id DESC
                ",
            )
            .map_err(|source| StoreError::Sql { source })?;

        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .map_err(|source| StoreError::Sql { source })?;

        let mut out = Vec::new();
        for row in rows {
            let (kind_raw, severity_raw, message, url, worker_id, recorded_at, details_raw) =
                row.map_err(|source| StoreError::Sql { source })?;
            let kind = FindingKind::parse(&kind_raw)
                .map_err(|_| StoreError::InvalidFindingKind { value: kind_raw })?;
            let severity = Severity::parse(&severity_raw)
                .map_err(|_| StoreError::InvalidSeverity {
                    value: severity_raw,
                })?;
            let details = details_raw
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(serde_json::Value::Null);
            out.push(Finding {
                kind,
                severity,
                message,
                url,
                worker_id,
                recorded_at,
                details,
            });
        }
        Ok(out)
    }

    pub fn coverage_stats(&self) -> Result<CoverageStats, StoreError> {
        let connection = self.connect()?;
        let count = |sql: &str| -> Result<u64, StoreError> {
            let value: i64 = connection
                .query_row(sql, [], |row| row.get(0))
                .map_err(|source| StoreError::Sql { source })?;
            Ok(value as u64)
        };

        Ok(CoverageStats {
            pages_explored: count("SELECT COUNT(*) FROM explored_pages")?,
            actions_executed: count("SELECT COUNT(*) FROM explored_actions")?,
            findings_count: count("SELECT COUNT(*) FROM findings")?,
            unique_urls: count("SELECT COUNT(DISTINCT url) FROM explored_pages")?,
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection =
            Connection::open(&self.db_path).map_err(|source| StoreError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|source| StoreError::Sql { source })?;
        Ok(connection)
    }
}
