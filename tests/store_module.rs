use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use webswarm::action::Action;
use webswarm::finding::{Finding, FindingKind, Severity};
use webswarm::fingerprint::{action_fingerprint, page_fingerprint};
use webswarm::page::PageState;
use webswarm::store::{ExplorationStore, RecordOutcome};

fn open_store(dir: &std::path::Path) -> ExplorationStore {
    let store = ExplorationStore::open(&dir.join("exploration.db")).expect("open store");
    store.ensure_schema().expect("schema");
    store
}

fn page(url: &str, title: &str, worker_id: u32) -> PageState {
    PageState {
        url: url.to_string(),
        title: title.to_string(),
        interactive_elements: Vec::new(),
        links: Vec::new(),
        forms: Vec::new(),
        images: Vec::new(),
        errors: Vec::new(),
        observed_at: 100,
        worker_id,
    }
}

#[test]
fn page_dedup_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());
    let state = page("https://app.test/dash", "Dashboard", 0);
    let fp = page_fingerprint(&state.url, &state.title);

    assert!(!store.has_explored_page(&fp).expect("lookup"));
    assert_eq!(
        store.record_page_explored(&fp, &state).expect("record"),
        RecordOutcome::Inserted
    );
    assert_eq!(
        store.record_page_explored(&fp, &state).expect("record again"),
        RecordOutcome::AlreadyRecorded
    );

    assert!(store.has_explored_page(&fp).expect("lookup"));
    let stats = store.coverage_stats().expect("stats");
    assert_eq!(stats.pages_explored, 1, "exactly one stored record");
}

#[test]
fn action_record_first_recorder_wins() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());
    let action = Action::click("#submit");
    let fp = action_fingerprint(&action);

    assert_eq!(
        store.record_action_explored(&fp, &action, 1).expect("first"),
        RecordOutcome::Inserted
    );
    assert_eq!(
        store.record_action_explored(&fp, &action, 2).expect("second"),
        RecordOutcome::AlreadyRecorded
    );
    assert_eq!(store.coverage_stats().expect("stats").actions_executed, 1);
}

#[test]
fn concurrent_action_inserts_elect_exactly_one_winner() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("exploration.db");
    {
        let store = ExplorationStore::open(&db_path).expect("open store");
        store.ensure_schema().expect("schema");
    }

    let action = Action::click("#contended");
    let fp = action_fingerprint(&action);
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for worker_id in 0..8_u32 {
        let barrier = Arc::clone(&barrier);
        let db_path = db_path.clone();
        let action = action.clone();
        let fp = fp.clone();
        handles.push(thread::spawn(move || {
            let store = ExplorationStore::open(&db_path).expect("open store");
            barrier.wait();
            store
                .record_action_explored(&fp, &action, worker_id)
                .expect("record")
        }));
    }

    let outcomes: Vec<RecordOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();

    let winners = outcomes
        .iter()
        .filter(|outcome| **outcome == RecordOutcome::Inserted)
        .count();
    assert_eq!(winners, 1, "exactly one recorder may win the race");

    let store = ExplorationStore::open(&db_path).expect("open store");
    assert_eq!(store.coverage_stats().expect("stats").actions_executed, 1);
}

#[test]
fn concurrent_page_upserts_keep_a_single_row() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("exploration.db");
    {
        let store = ExplorationStore::open(&db_path).expect("open store");
        store.ensure_schema().expect("schema");
    }

    let state = page("https://app.test/contended", "Contended", 0);
    let fp = page_fingerprint(&state.url, &state.title);
    let barrier = Arc::new(Barrier::new(6));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let barrier = Arc::clone(&barrier);
        let db_path = db_path.clone();
        let state = state.clone();
        let fp = fp.clone();
        handles.push(thread::spawn(move || {
            let store = ExplorationStore::open(&db_path).expect("open store");
            barrier.wait();
            store.record_page_explored(&fp, &state).expect("record")
        }));
    }
    let outcomes: Vec<RecordOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect();

    let winners = outcomes
        .iter()
        .filter(|outcome| **outcome == RecordOutcome::Inserted)
        .count();
    assert_eq!(winners, 1);

    let store = ExplorationStore::open(&db_path).expect("open store");
    assert_eq!(store.coverage_stats().expect("stats").pages_explored, 1);
}

#[test]
fn recent_pages_are_most_recent_first_and_bounded() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());

    for idx in 0..5 {
        let state = page(&format!("https://app.test/p{idx}"), &format!("P{idx}"), 0);
        let fp = page_fingerprint(&state.url, &state.title);
        store.record_page_explored(&fp, &state).expect("record");
    }

    let recent = store.recent_explored_pages(3).expect("recent");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].url, "https://app.test/p4");
    assert_eq!(recent[1].url, "https://app.test/p3");
    assert_eq!(recent[2].url, "https://app.test/p2");
}

#[test]
fn findings_round_trip_with_details() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());

    let finding = Finding::new(
        FindingKind::HttpError,
        Severity::High,
        "HTTP 500 - https://app.test/api",
        "https://app.test/dash",
        3,
    )
    .with_details(serde_json::json!({ "status": 500 }));
    store.add_finding(&finding).expect("add finding");

    let plain = Finding::new(
        FindingKind::ConsoleError,
        Severity::Medium,
        "TypeError: undefined",
        "https://app.test/dash",
        3,
    );
    store.add_finding(&plain).expect("add finding");

    let all = store.all_findings().expect("all findings");
    assert_eq!(all.len(), 2);
    let http = all
        .iter()
        .find(|f| f.kind == FindingKind::HttpError)
        .expect("http finding");
    assert_eq!(http.severity, Severity::High);
    assert_eq!(http.details["status"], 500);
    let console = all
        .iter()
        .find(|f| f.kind == FindingKind::ConsoleError)
        .expect("console finding");
    assert!(console.details.is_null());

    assert_eq!(store.coverage_stats().expect("stats").findings_count, 2);
}

#[test]
fn unique_urls_count_distinct_pages_not_fingerprints() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path());

    // Same URL observed under two titles: two fingerprints, one unique URL.
    for title in ["Loading", "Loaded"] {
        let state = page("https://app.test/slow", title, 0);
        let fp = page_fingerprint(&state.url, &state.title);
        store.record_page_explored(&fp, &state).expect("record");
    }

    let stats = store.coverage_stats().expect("stats");
    assert_eq!(stats.pages_explored, 2);
    assert_eq!(stats.unique_urls, 1);
}

#[test]
fn store_survives_reopen_within_a_run() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("exploration.db");

    {
        let store = ExplorationStore::open(&db_path).expect("open store");
        store.ensure_schema().expect("schema");
        let state = page("https://app.test/", "Home", 0);
        let fp = page_fingerprint(&state.url, &state.title);
        store.record_page_explored(&fp, &state).expect("record");
    }

    let store = ExplorationStore::open(&db_path).expect("reopen store");
    store.ensure_schema().expect("schema is idempotent");
    let state = page("https://app.test/", "Home", 1);
    let fp = page_fingerprint(&state.url, &state.title);
    assert!(store.has_explored_page(&fp).expect("lookup after reopen"));
}
