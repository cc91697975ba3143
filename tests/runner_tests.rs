mod common;

use std::fs;
use std::path::Path;

use common::{
    ledger_entries, ledger_entry, orphaned_backups, source, AutocommitDatabase, FailingDatabase,
};
use sqldrift::{digest, Database, Ledger, LedgerConfig, MigrationRunner, SqlDriftError, SqliteDatabase};

fn fixtures_path() -> &'static Path {
    Path::new("tests/fixtures/migrations")
}

const USERS_V1: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY);";
const USERS_V2: &str = "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY);\nCREATE INDEX idx_users_id ON users(id);";
const POSTS: &str = "CREATE TABLE posts (id INTEGER PRIMARY KEY);";

#[test]
fn test_fresh_database_single_sql_file() {
    let dir = tempfile::tempdir().unwrap();
    let content = "-- Description: create users\nCREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);";
    fs::write(dir.path().join("001_init.sql"), content).unwrap();

    let db = SqliteDatabase::in_memory().unwrap();
    let runner = MigrationRunner::from_dir(&db, dir.path()).unwrap();

    assert_eq!(runner.run().unwrap(), vec!["001"]);

    let entries = ledger_entries(&db);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].version, "001");
    assert_eq!(entries[0].description.as_deref(), Some("create users"));
    assert_eq!(entries[0].checksum, digest(content));
    assert!(db.table_exists("users").unwrap());

    assert!(runner.run().unwrap().is_empty());
}

#[test]
fn test_fixture_directory_applies_all() {
    let db = SqliteDatabase::in_memory().unwrap();
    let runner = MigrationRunner::from_dir(&db, fixtures_path()).unwrap();

    assert_eq!(runner.run().unwrap(), vec!["001", "002", "003"]);
    assert!(db.table_exists("posts").unwrap());

    let descriptions: Vec<Option<String>> = ledger_entries(&db)
        .into_iter()
        .map(|e| e.description)
        .collect();
    assert_eq!(
        descriptions,
        vec![
            Some("create users".to_string()),
            Some("SQL Migration".to_string()),
            Some("create posts".to_string()),
        ]
    );
}

#[test]
fn test_arbitrary_discovery_order_applied_sorted() {
    let db = SqliteDatabase::in_memory().unwrap();
    let sources = vec![
        source("003", "ALTER TABLE users ADD COLUMN age INTEGER;"),
        source("001", USERS_V1),
        source("002", "ALTER TABLE users ADD COLUMN name TEXT;"),
    ];

    let applied = MigrationRunner::new(&db, sources).run().unwrap();
    assert_eq!(applied, vec!["001", "002", "003"]);
}

#[test]
fn test_changed_migration_reapplied() {
    let db = SqliteDatabase::in_memory().unwrap();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    let untouched = ledger_entry(&db, "002");

    let runner = MigrationRunner::new(&db, vec![source("001", USERS_V2), source("002", POSTS)]);
    assert_eq!(runner.run().unwrap(), vec!["001"]);

    assert_eq!(ledger_entry(&db, "001").checksum, digest(USERS_V2));
    assert_eq!(ledger_entry(&db, "002"), untouched);
    assert!(orphaned_backups(&db).is_empty());

    let index = db
        .query_row("SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_users_id'", &[])
        .unwrap();
    assert!(index.is_some());

    assert!(runner.run().unwrap().is_empty());
}

#[test]
fn test_failed_reapply_keeps_original_entry() {
    let db = SqliteDatabase::in_memory().unwrap();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    let before = ledger_entries(&db);

    let runner = MigrationRunner::new(
        &db,
        vec![source("001", "CREATE TABLE extra (id INTEGER); SELEC broken;"), source("002", POSTS)],
    );
    let err = runner.run().unwrap_err();

    assert!(matches!(err, SqlDriftError::MigrationUpdateFailed { ref version, .. } if version == "001"));
    assert!(err.database_error().is_some());
    assert_eq!(ledger_entries(&db), before);
    assert!(!db.table_exists("extra").unwrap());
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_failed_reapply_stops_run() {
    let db = SqliteDatabase::in_memory().unwrap();
    MigrationRunner::new(&db, vec![source("001", USERS_V1)]).run().unwrap();

    let runner = MigrationRunner::new(&db, vec![source("001", "SELEC 1;"), source("002", POSTS)]);
    assert!(runner.run().is_err());

    assert!(!db.table_exists("posts").unwrap());
    assert_eq!(ledger_entries(&db).len(), 1);
}

#[test]
fn test_autocommit_backend_restores_ledger_from_backup() {
    let db = AutocommitDatabase::in_memory();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    let before = ledger_entries(&db);

    // The failing SQL damages another ledger row before erroring.
    let broken = "DELETE FROM migrations WHERE version = '002'; SELEC 1;";
    let runner = MigrationRunner::new(&db, vec![source("001", broken), source("002", POSTS)]);
    let err = runner.run().unwrap_err();

    assert!(matches!(err, SqlDriftError::MigrationUpdateFailed { ref version, .. } if version == "001"));
    assert_eq!(ledger_entries(&db), before);
    assert!(orphaned_backups(&db).is_empty());

    // the restored ledger still enforces its primary key
    let ledger = Ledger::new(&db, &LedgerConfig::default()).unwrap();
    assert!(matches!(
        ledger.record_new("002", "dup", "x"),
        Err(SqlDriftError::DuplicateKeyViolation(_))
    ));
}

#[test]
fn test_autocommit_backend_successful_reapply_drops_backup() {
    let db = AutocommitDatabase::in_memory();
    MigrationRunner::new(&db, vec![source("001", USERS_V1)]).run().unwrap();

    let applied = MigrationRunner::new(&db, vec![source("001", USERS_V2)]).run().unwrap();

    assert_eq!(applied, vec!["001"]);
    assert_eq!(ledger_entry(&db, "001").checksum, digest(USERS_V2));
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_orphaned_backup_is_left_for_operator() {
    let db = SqliteDatabase::in_memory().unwrap();
    let runner = MigrationRunner::new(&db, vec![source("001", USERS_V1)]);
    runner.run().unwrap();

    let ledger = runner.ledger().unwrap();
    let leftover = ledger.backup_table_name("001");
    ledger.backup_to(&leftover).unwrap();

    let runner = MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)]);
    assert_eq!(runner.run().unwrap(), vec!["002"]);
    assert_eq!(orphaned_backups(&db), vec![leftover.clone()]);

    assert_eq!(ledger.prune_backups().unwrap(), vec![leftover]);
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_failed_new_migration_rolls_back_whole_unit() {
    let db = SqliteDatabase::in_memory().unwrap();
    let runner = MigrationRunner::new(
        &db,
        vec![source("001", USERS_V1), source("002", "CREATE TABLE half (id INTEGER); SELEC 1;")],
    );

    let err = runner.run().unwrap_err();
    assert!(matches!(err, SqlDriftError::MigrationExecutionFailed { ref version, .. } if version == "002"));

    assert!(!db.table_exists("half").unwrap());
    let versions: Vec<String> = ledger_entries(&db).into_iter().map(|e| e.version).collect();
    assert_eq!(versions, vec!["001"]);
}

#[test]
fn test_reapply_refreshes_executed_at() {
    let db = SqliteDatabase::in_memory().unwrap();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    db.execute_batch("UPDATE migrations SET executed_at = '2000-01-01 00:00:00'")
        .unwrap();
    let old = ledger_entry(&db, "001").executed_at;

    MigrationRunner::new(&db, vec![source("001", USERS_V2), source("002", POSTS)])
        .run()
        .unwrap();

    let entry = ledger_entry(&db, "001");
    assert!(entry.executed_at > old);
    assert_eq!(entry.checksum, digest(USERS_V2));
    assert_eq!(ledger_entry(&db, "002").executed_at, old);
}

#[test]
fn test_reapply_with_extended_ledger_keeps_rows() {
    let db = SqliteDatabase::in_memory().unwrap();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    db.execute_batch("ALTER TABLE migrations ADD COLUMN applied_by TEXT").unwrap();

    let applied = MigrationRunner::new(&db, vec![source("001", USERS_V2), source("002", POSTS)])
        .run()
        .unwrap();

    assert_eq!(applied, vec!["001"]);
    assert_eq!(ledger_entries(&db).len(), 2);
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_autocommit_backend_extended_ledger_survives_failed_reapply() {
    let db = AutocommitDatabase::in_memory();
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    db.execute_batch("ALTER TABLE migrations ADD COLUMN applied_by TEXT").unwrap();
    db.execute_batch("UPDATE migrations SET applied_by = 'ops'").unwrap();
    let before = ledger_entries(&db);

    let runner = MigrationRunner::new(&db, vec![source("001", "SELEC 1;"), source("002", POSTS)]);
    assert!(matches!(
        runner.run(),
        Err(SqlDriftError::MigrationUpdateFailed { .. })
    ));

    assert_eq!(ledger_entries(&db), before);
    let applied_by = db
        .query_row("SELECT applied_by FROM migrations WHERE version = '002'", &[])
        .unwrap()
        .unwrap();
    assert_eq!(applied_by.get(0), Some("ops"));
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_partial_backup_never_replaces_ledger() {
    let db = FailingDatabase::new(AutocommitDatabase::in_memory(), "INSERT INTO migrations_backup_");
    MigrationRunner::new(&db, vec![source("001", USERS_V1), source("002", POSTS)])
        .run()
        .unwrap();
    let before = ledger_entries(&db);

    let runner = MigrationRunner::new(&db, vec![source("001", USERS_V2), source("002", POSTS)]);
    let err = runner.run().unwrap_err();

    assert!(matches!(err, SqlDriftError::MigrationUpdateFailed { ref version, .. } if version == "001"));
    assert_eq!(ledger_entries(&db), before);
    assert!(orphaned_backups(&db).is_empty());
}

#[test]
fn test_null_checksum_row_surfaces_ledger_error() {
    let db = SqliteDatabase::in_memory().unwrap();
    let runner = MigrationRunner::new(&db, vec![source("001", USERS_V1)]);
    runner.ledger().unwrap().ensure_schema().unwrap();
    db.execute_batch("INSERT INTO migrations (version, description) VALUES ('001', 'manual')")
        .unwrap();

    let err = runner.run().unwrap_err();
    assert!(matches!(err, SqlDriftError::Ledger(_)));
    assert!(!db.table_exists("users").unwrap());
}
