use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tombstone_core::db::open_db_in_memory;
use tombstone_core::{
    GuardDecision, LifecycleError, LifecycleHooks, RecordType, RecordTypeOptions, SaveHooks,
    SoftDelete, SqlScope, SqliteMarkerStore, SqliteRecord, StoreError, WriteMode,
};
use uuid::Uuid;

const FIXED_NOW: i64 = 1_700_000_000_000;

fn fixed_clock() -> i64 {
    FIXED_NOW
}

fn create_table(conn: &Connection, table: &str, marker_column: &str) {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            {marker_column} INTEGER,
            updated_at INTEGER NOT NULL DEFAULT 0
        );"
    ))
    .unwrap();
}

fn posts_type(
    options: RecordTypeOptions,
    hooks: LifecycleHooks<SqliteRecord>,
) -> RecordType<SqliteRecord> {
    RecordType::from_options("posts", &options, hooks).unwrap()
}

fn persisted_marker(conn: &Connection, column: &str, id: Uuid) -> Option<i64> {
    conn.query_row(
        &format!("SELECT {column} FROM posts WHERE id = ?1;"),
        [id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn persisted_updated_at(conn: &Connection, id: Uuid) -> i64 {
    conn.query_row(
        "SELECT updated_at FROM posts WHERE id = ?1;",
        [id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

type EventLog = Arc<Mutex<Vec<&'static str>>>;

fn push(events: &EventLog, name: &'static str) {
    events.lock().unwrap().push(name);
}

fn recording_hooks(events: &EventLog) -> LifecycleHooks<SqliteRecord> {
    let before_remove = Arc::clone(events);
    let after_remove = Arc::clone(events);
    let before_restore = Arc::clone(events);
    let after_restore = Arc::clone(events);
    LifecycleHooks::<SqliteRecord>::builder()
        .before_remove(move |_| {
            push(&before_remove, "before_remove");
            GuardDecision::Allow
        })
        .after_remove(move |_| push(&after_remove, "after_remove"))
        .before_restore(move |_| {
            push(&before_restore, "before_restore");
            GuardDecision::Allow
        })
        .after_restore(move |_| push(&after_restore, "after_restore"))
        .build()
}

#[test]
fn remove_marks_record_and_second_remove_is_noop() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let record_type = posts_type(RecordTypeOptions::default(), LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store).with_clock(fixed_clock);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.is_kept(&record));

    assert!(soft.remove(&mut record).unwrap());
    assert!(soft.is_removed(&record));
    assert_eq!(record.marker, Some(FIXED_NOW));
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), Some(FIXED_NOW));

    let later = SoftDelete::new(&record_type, &store).with_clock(|| FIXED_NOW + 60_000);
    assert!(!later.remove(&mut record).unwrap());
    assert_eq!(record.marker, Some(FIXED_NOW));
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), Some(FIXED_NOW));
}

#[test]
fn restore_clears_marker_and_second_restore_is_noop() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let record_type = posts_type(RecordTypeOptions::default(), LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = SqliteRecord {
        id: Uuid::new_v4(),
        marker: Some(FIXED_NOW),
    };
    store.insert(&record).unwrap();

    assert!(soft.restore(&mut record).unwrap());
    assert!(soft.is_kept(&record));
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), None);

    assert!(!soft.restore(&mut record).unwrap());
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), None);
}

#[test]
fn remove_then_restore_leaves_no_residual_marker() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let record_type = posts_type(RecordTypeOptions::default(), LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.remove(&mut record).unwrap());
    assert!(soft.restore(&mut record).unwrap());

    assert_eq!(record, SqliteRecord::kept(record.id));
    let reloaded = store
        .find(record.id, &SqlScope::unscoped())
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.marker, None);
}

#[test]
fn hooks_run_once_in_order_for_each_transition() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let events = EventLog::default();
    let record_type = posts_type(RecordTypeOptions::default(), recording_hooks(&events));
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    soft.remove(&mut record).unwrap();
    soft.restore(&mut record).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["before_remove", "after_remove", "before_restore", "after_restore"]
    );
}

#[test]
fn noop_transition_runs_no_hooks() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let events = EventLog::default();
    let record_type = posts_type(RecordTypeOptions::default(), recording_hooks(&events));
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(!soft.restore(&mut record).unwrap());
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn guard_abort_blocks_write_and_observers() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let observed = Arc::new(AtomicUsize::new(0));
    let later_guard_calls = Arc::new(AtomicUsize::new(0));
    let observer = Arc::clone(&observed);
    let later_guard = Arc::clone(&later_guard_calls);
    let hooks = LifecycleHooks::<SqliteRecord>::builder()
        .before_remove(|_| GuardDecision::Abort)
        .before_remove(move |_| {
            later_guard.fetch_add(1, Ordering::SeqCst);
            GuardDecision::Allow
        })
        .after_remove(move |_| {
            observer.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let record_type = posts_type(RecordTypeOptions::default(), hooks);
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(!soft.remove(&mut record).unwrap());

    assert_eq!(record.marker, None);
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), None);
    assert_eq!(observed.load(Ordering::SeqCst), 0);
    assert_eq!(later_guard_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn guard_sees_record_before_write() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let hooks = LifecycleHooks::<SqliteRecord>::builder()
        .before_remove(|record| record.marker.is_none().into())
        .after_remove(|record| assert!(record.is_removed()))
        .build();
    let record_type = posts_type(RecordTypeOptions::default(), hooks);
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.remove(&mut record).unwrap());
}

#[test]
fn hooked_writes_wrap_store_save_hooks_inside_type_hooks() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let events = EventLog::default();
    let options = RecordTypeOptions {
        skip_ar_callbacks: false,
        ..RecordTypeOptions::default()
    };
    let record_type = posts_type(options, recording_hooks(&events));

    let before_save = Arc::clone(&events);
    let after_save = Arc::clone(&events);
    let save_hooks = SaveHooks::<SqliteRecord>::new()
        .guard(move |_| {
            push(&before_save, "before_save");
            GuardDecision::Allow
        })
        .observe(move |_| push(&after_save, "after_save"));
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config())
        .unwrap()
        .with_save_hooks(save_hooks);
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.remove(&mut record).unwrap());

    assert_eq!(
        *events.lock().unwrap(),
        vec!["before_remove", "before_save", "after_save", "after_remove"]
    );
    assert!(persisted_updated_at(&conn, record.id) > 0);
}

#[test]
fn skipped_store_callbacks_bypass_save_hooks_and_updated_at() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let save_calls = Arc::new(AtomicUsize::new(0));
    let guard_calls = Arc::clone(&save_calls);
    let observer_calls = Arc::clone(&save_calls);
    let record_type = posts_type(RecordTypeOptions::default(), LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config())
        .unwrap()
        .with_save_hooks(
            SaveHooks::<SqliteRecord>::new()
                .guard(move |_| {
                    guard_calls.fetch_add(1, Ordering::SeqCst);
                    GuardDecision::Allow
                })
                .observe(move |_| {
                    observer_calls.fetch_add(1, Ordering::SeqCst);
                }),
        );
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.remove(&mut record).unwrap());

    assert_eq!(save_calls.load(Ordering::SeqCst), 0);
    assert_eq!(persisted_updated_at(&conn, record.id), 0);
}

#[test]
fn store_guard_veto_reports_failure_without_type_observers() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let events = EventLog::default();
    let options = RecordTypeOptions {
        skip_ar_callbacks: false,
        ..RecordTypeOptions::default()
    };
    let record_type = posts_type(options, recording_hooks(&events));
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config())
        .unwrap()
        .with_save_hooks(SaveHooks::<SqliteRecord>::new().guard(|_| GuardDecision::Abort));
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(!soft.remove(&mut record).unwrap());

    assert_eq!(record.marker, None);
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), None);
    assert_eq!(*events.lock().unwrap(), vec!["before_remove"]);
}

#[test]
fn direct_mode_skips_every_hook() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let events = EventLog::default();
    let options = RecordTypeOptions {
        skip_ar_callbacks: false,
        ..RecordTypeOptions::default()
    };
    let hooks = LifecycleHooks::<SqliteRecord>::builder()
        .before_remove(|_| GuardDecision::Abort)
        .build();
    let record_type = posts_type(options, hooks);
    let after_save = Arc::clone(&events);
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config())
        .unwrap()
        .with_save_hooks(
            SaveHooks::<SqliteRecord>::new().observe(move |_| push(&after_save, "after_save")),
        );
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert!(soft.remove_with(&mut record, WriteMode::Direct).unwrap());
    assert!(soft.is_removed(&record));
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(persisted_updated_at(&conn, record.id), 0);

    assert!(soft.restore_with(&mut record, WriteMode::Direct).unwrap());
    assert_eq!(persisted_marker(&conn, "deleted_at", record.id), None);
}

#[test]
fn custom_column_without_default_scope_scenario() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "removed_at");
    let options = RecordTypeOptions {
        column: "removed_at".to_string(),
        without_default_scope: true,
        ..RecordTypeOptions::default()
    };
    let record_type = posts_type(options, LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    assert_eq!(persisted_marker(&conn, "removed_at", record.id), None);

    assert!(soft.remove(&mut record).unwrap());
    assert!(persisted_marker(&conn, "removed_at", record.id).is_some());
    assert!(soft.is_removed(&record));

    soft.restore_strict(&mut record).unwrap();
    assert_eq!(persisted_marker(&conn, "removed_at", record.id), None);
    assert!(soft.is_kept(&record));
}

#[test]
fn strict_remove_of_removed_record_fails_with_record() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "removed_at");
    let options = RecordTypeOptions {
        column: "removed_at".to_string(),
        without_default_scope: true,
        ..RecordTypeOptions::default()
    };
    let record_type = posts_type(options, LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let past = FIXED_NOW - 86_400_000;
    let mut record = SqliteRecord {
        id: Uuid::new_v4(),
        marker: Some(past),
    };
    store.insert(&record).unwrap();

    let err = soft.remove_strict(&mut record).unwrap_err();
    assert_eq!(err.to_string(), "Failed to soft delete the record.");
    match err {
        LifecycleError::TransitionNotApplied(failed) => {
            assert_eq!(failed.id, record.id);
            assert_eq!(failed.marker, Some(past));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(persisted_marker(&conn, "removed_at", record.id), Some(past));
}

#[test]
fn strict_variants_report_guard_aborts_like_noops() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let hooks = LifecycleHooks::<SqliteRecord>::builder()
        .before_restore(|_| GuardDecision::Abort)
        .build();
    let record_type = posts_type(RecordTypeOptions::default(), hooks);
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut record = store.insert_kept(Uuid::new_v4()).unwrap();
    soft.remove_strict(&mut record).unwrap();

    let err = soft.restore_strict(&mut record).unwrap_err();
    assert_eq!(err.to_string(), "Failed to restore the record.");
    assert!(matches!(
        err,
        LifecycleError::TransitionNotReversed(ref failed) if failed.id == record.id
    ));
    assert!(soft.is_removed(&record));
}

#[test]
fn missing_row_surfaces_store_error() {
    let conn = open_db_in_memory().unwrap();
    create_table(&conn, "posts", "deleted_at");
    let record_type = posts_type(RecordTypeOptions::default(), LifecycleHooks::none());
    let store = SqliteMarkerStore::try_new(&conn, "posts", record_type.config()).unwrap();
    let soft = SoftDelete::new(&record_type, &store);

    let mut ghost = SqliteRecord::kept(Uuid::new_v4());
    let err = soft.remove(&mut ghost).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == ghost.id));
    assert_eq!(ghost.marker, None);

    let strict_err = soft.remove_strict(&mut ghost).unwrap_err();
    assert!(matches!(
        strict_err,
        LifecycleError::Store(StoreError::NotFound(_))
    ));
}
