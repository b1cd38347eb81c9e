// tests/snapshot_store.rs
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;

use fx_rate_watcher::error::StorageError;
use fx_rate_watcher::ingest::parse::parse_snapshot_file;
use fx_rate_watcher::{RateRow, RateTable, SnapshotId, SnapshotStore};

fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hh, mm, ss)
        .unwrap()
}

fn table(ts: NaiveDateTime, eur_sell: Option<f64>) -> RateTable {
    let row = |code: &str, name: &str, sell: Option<f64>| RateRow {
        code: code.into(),
        name: name.into(),
        exchange_buy: Some(745.8),
        exchange_sell: sell,
        cash_buy: None,
        cash_sell: sell,
    };
    RateTable::new(
        vec![
            row("EUR", "欧元", eur_sell),
            row("USD", "美元", Some(688.93)),
            row("PKR", "巴基斯坦卢比", None),
        ],
        ts,
    )
    .unwrap()
}

#[test]
fn persist_then_read_back_preserves_quotes_and_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let t = table(at(2023, 4, 1, 4, 14, 5), Some(751.23));

    let id = store.persist(&t).expect("persist");
    assert_eq!(id.to_string(), "2023_04_01-04_14_05");
    assert!(dir.path().join("2023_04_01-04_14_05.csv").is_file());

    let back = parse_snapshot_file(&store.path_of(&id)).expect("read back");
    let pairs = |t: &RateTable| {
        t.rows()
            .iter()
            .map(|r| (r.code.clone(), r.exchange_sell))
            .collect::<Vec<_>>()
    };
    assert_eq!(pairs(&back), pairs(&t));
    assert_eq!(back.published_at(), t.published_at());
    assert_eq!(back.get("PKR").unwrap().cash_buy, None);
    assert_eq!(back, store.load(&id).unwrap());
}

#[test]
fn snapshot_csv_uses_canonical_header() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let id = store.persist(&table(at(2023, 4, 1, 4, 14, 5), Some(751.23))).unwrap();

    let raw = fs::read_to_string(store.path_of(&id)).unwrap();
    let mut lines = raw.lines();
    assert_eq!(
        lines.next(),
        Some("code,name,exch_buy,exch_sell,cash_buy,cash_sell,published_at")
    );
    assert_eq!(
        lines.next(),
        Some("EUR,欧元,745.8,751.23,,751.23,2023-04-01 04:14:05")
    );
}

#[test]
fn persist_into_missing_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("nope"));
    let err = store.persist(&table(at(2023, 4, 1, 4, 14, 5), None)).unwrap_err();
    assert!(matches!(err, StorageError::MissingDir(_)));
    assert!(matches!(store.latest(), Err(StorageError::MissingDir(_))));
}

#[test]
fn latest_is_greatest_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    assert_eq!(store.latest().unwrap(), None);

    store.persist(&table(at(2023, 4, 5, 3, 21, 2), Some(750.0))).unwrap();
    store.persist(&table(at(2023, 4, 1, 4, 14, 5), Some(751.0))).unwrap();
    fs::write(dir.path().join("README.txt"), "not a snapshot").unwrap();
    fs::write(dir.path().join("backup.csv"), "code\n").unwrap();

    assert_eq!(store.list_snapshots().unwrap().len(), 2);
    assert_eq!(
        store.latest().unwrap(),
        SnapshotId::parse("2023_04_05-03_21_02")
    );
}

#[test]
fn same_second_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let ts = at(2023, 4, 1, 4, 14, 5);

    store.persist(&table(ts, Some(751.0))).unwrap();
    let id = store.persist(&table(ts, Some(749.5))).unwrap();

    assert_eq!(store.list_snapshots().unwrap(), vec![id]);
    let back = store.load(&id).unwrap();
    assert_eq!(back.get("EUR").unwrap().exchange_sell, Some(749.5));
    // no temp files left behind
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn outdated_is_relative_to_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.persist(&table(at(2023, 3, 1, 0, 0, 0), Some(1.0))).unwrap();
    store.persist(&table(at(2023, 4, 15, 0, 0, 0), Some(1.0))).unwrap();
    store.persist(&table(at(2023, 6, 1, 0, 0, 0), Some(1.0))).unwrap();

    let old = store.outdated(60).unwrap();
    assert_eq!(old, vec![SnapshotId::from_published_at(at(2023, 3, 1, 0, 0, 0))]);

    let report = store.cleanup(60).unwrap();
    assert_eq!(report.removed, old);
    assert!(report.failed.is_empty());
    assert_eq!(store.list_snapshots().unwrap().len(), 2);
}

#[test]
fn single_snapshot_is_never_outdated() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.persist(&table(at(2001, 1, 1, 0, 0, 0), Some(1.0))).unwrap();
    assert!(store.outdated(0).unwrap().is_empty());
}

#[test]
fn deleting_a_missing_snapshot_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let id = SnapshotId::from_published_at(at(2023, 4, 1, 4, 14, 5));
    assert!(matches!(store.delete(&id), Err(StorageError::Io { .. })));
}

#[test]
fn delete_all_keeps_going_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let present = store.persist(&table(at(2023, 4, 5, 3, 21, 2), Some(750.0))).unwrap();
    let missing = SnapshotId::from_published_at(at(2023, 4, 1, 4, 14, 5));

    let report = store.delete_all(&[missing, present]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, missing);
    assert_eq!(report.removed, vec![present]);
    assert!(!store.path_of(&present).exists());
}

#[test]
fn failed_persist_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let ts = at(2023, 4, 1, 4, 14, 5);
    // a directory squatting on the snapshot name makes the final rename fail
    fs::create_dir(store.path_of(&SnapshotId::from_published_at(ts))).unwrap();

    let err = store.persist(&table(ts, Some(751.0))).unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["2023_04_01-04_14_05.csv".to_string()]);
}
