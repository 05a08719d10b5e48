//! End-to-end flow tests over a temporary state directory:
//! append -> load -> search -> render plan, plus the guard lifecycle with
//! the real signal-zero probe against this test process's own pid.

use shelltrace_core::{
    Config, Error, GuardStatus, LogStore, SearchEngine, SearchQuery, SingletonGuard,
};

fn temp_config(dir: &tempfile::TempDir) -> Config {
    Config::for_state_dir(dir.path())
}

#[test]
fn append_load_search_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let store = LogStore::new(&config);

    for cmd in [
        "git status",
        "cargo build",
        "git commit -m 'wip'",
        "cargo test",
        "git push",
    ] {
        store.append(cmd).unwrap();
    }

    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[2].text, "git commit -m 'wip'");
    assert!(records.iter().all(|r| r.timestamp.is_some()));

    let mut query = SearchQuery::literal("git");
    query.before = 1;
    query.after = 1;

    let matches = SearchEngine::match_indices(&records, &query).unwrap();
    assert_eq!(matches, vec![0, 2, 4]);

    let windows = SearchEngine::context_windows(&matches, records.len(), &query);
    let rendered: Vec<usize> = windows
        .iter()
        .flat_map(|w| w.lines.iter().map(|l| l.index))
        .collect();
    // Every record shown exactly once, in original order, despite the
    // overlapping context windows.
    assert_eq!(rendered, vec![0, 1, 2, 3, 4]);
}

#[test]
fn limit_and_case_flags_compose() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let store = LogStore::new(&config);

    for i in 0..6 {
        store.append(&format!("ECHO round {}", i)).unwrap();
    }

    let records = store.load_all().unwrap();

    let mut query = SearchQuery::literal("echo");
    query.case_sensitive = false;
    query.limit = Some(2);

    let matches = SearchEngine::match_indices(&records, &query).unwrap();
    assert_eq!(matches, vec![4, 5]);
}

#[test]
fn search_against_missing_log_reports_log_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(&temp_config(&dir));
    assert!(matches!(store.load_all(), Err(Error::LogMissing { .. })));
}

#[test]
fn guard_lifecycle_with_real_probe() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let guard = SingletonGuard::new(&config);

    assert_eq!(guard.status(), GuardStatus::Absent);

    // This test process is alive by definition, so acquiring with our own
    // pid makes a genuine Running marker.
    let handle = guard.acquire().unwrap();
    assert_eq!(handle.pid, std::process::id());
    assert_eq!(guard.status(), GuardStatus::Running(handle.pid));

    assert!(matches!(
        guard.acquire(),
        Err(Error::AlreadyRunning { .. })
    ));

    guard.release().unwrap();
    guard.release().unwrap();
    assert_eq!(guard.status(), GuardStatus::Absent);
}

#[test]
fn stale_marker_reclaimed_with_real_probe() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let guard = SingletonGuard::new(&config);

    // A pid far above any plausible live process on the test machine.
    std::fs::write(config.marker_path(), "999999999").unwrap();
    assert_eq!(guard.status(), GuardStatus::Stale(999999999));

    let handle = guard.acquire().unwrap();
    assert_eq!(handle.pid, std::process::id());
}
