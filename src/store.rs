// src/store.rs
//! Timestamp-named CSV snapshots of rate tables in a single directory.
//!
//! One writer is assumed. Two tables published in the same second map to the same
//! file and the later write wins.

use chrono::{NaiveDateTime, Timelike};
use metrics::counter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::ingest::parse::{parse_snapshot_file, SnapshotRecord};
use crate::ingest::types::RateTable;

const ID_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";
const EXT: &str = "csv";

/// Storage identity of a snapshot: its publish time at second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(NaiveDateTime);

impl SnapshotId {
    pub fn from_published_at(ts: NaiveDateTime) -> Self {
        // drop sub-second precision so the id round-trips through the file name
        Self(ts.with_nanosecond(0).unwrap_or(ts))
    }

    /// Parse a file stem such as `2023_04_01-04_14_05`.
    pub fn parse(stem: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(stem, ID_FORMAT).ok().map(Self)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.0
    }

    pub fn file_name(&self) -> String {
        format!("{self}.{EXT}")
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ID_FORMAT))
    }
}

/// Outcome of a best-effort retention sweep.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<SnapshotId>,
    pub failed: Vec<(SnapshotId, StorageError)>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(StorageError::MissingDir(self.dir.clone()))
        }
    }

    /// Write `table` as a snapshot named after its publish time.
    ///
    /// The file is written next to its final name and renamed into place, so readers
    /// never observe a partial snapshot.
    pub fn persist(&self, table: &RateTable) -> Result<SnapshotId, StorageError> {
        self.ensure_dir()?;
        let id = SnapshotId::from_published_at(table.published_at());
        let path = self.path_of(&id);
        let tmp = self.dir.join(format!(".{}.tmp", id.file_name()));

        if let Err(e) = write_then_rename(table, id, &tmp, &path) {
            // best effort; the original error is what gets reported
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        counter!("fx_snapshots_written_total").increment(1);
        tracing::info!(target: "store", snapshot = %id, path = %path.display(), "snapshot saved");
        Ok(id)
    }

    /// All snapshot ids, oldest first. Ordering comes from the parsed timestamps.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotId>, StorageError> {
        self.ensure_dir()?;
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match SnapshotId::parse(stem) {
                Some(id) => ids.push(id),
                None => tracing::debug!(target: "store", file = %path.display(), "ignoring non-snapshot file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Snapshot with the greatest timestamp, if any.
    pub fn latest(&self) -> Result<Option<SnapshotId>, StorageError> {
        let latest = self.list_snapshots()?.into_iter().max();
        match &latest {
            Some(id) => tracing::debug!(target: "store", snapshot = %id, "latest snapshot"),
            None => tracing::info!(target: "store", dir = %self.dir.display(), "no snapshot stored yet"),
        }
        Ok(latest)
    }

    /// Snapshots more than `retention_days` whole days older than the latest one.
    /// The reference point is the latest snapshot, not the wall clock.
    pub fn outdated(&self, retention_days: i64) -> Result<Vec<SnapshotId>, StorageError> {
        let ids = self.list_snapshots()?;
        Ok(outdated_relative_to_latest(&ids, retention_days))
    }

    /// Best-effort removal of a single snapshot.
    pub fn delete(&self, id: &SnapshotId) -> Result<(), StorageError> {
        let path = self.path_of(id);
        fs::remove_file(&path).map_err(|source| StorageError::Io { path, source })?;
        counter!("fx_snapshots_removed_total").increment(1);
        Ok(())
    }

    /// Remove every outdated snapshot; one failure does not stop the rest.
    pub fn cleanup(&self, retention_days: i64) -> Result<CleanupReport, StorageError> {
        let outdated = self.outdated(retention_days)?;
        Ok(self.delete_all(&outdated))
    }

    /// Delete each of `ids`, collecting failures instead of stopping at the first.
    pub fn delete_all(&self, ids: &[SnapshotId]) -> CleanupReport {
        let mut report = CleanupReport::default();
        for id in ids {
            match self.delete(id) {
                Ok(()) => {
                    tracing::info!(target: "store", snapshot = %id, "removed outdated snapshot");
                    report.removed.push(*id);
                }
                Err(e) => {
                    tracing::error!(target: "store", snapshot = %id, error = %e, "failed to remove snapshot");
                    report.failed.push((*id, e));
                }
            }
        }
        report
    }

    /// Reconstruct the rate table stored under `id`.
    pub fn load(&self, id: &SnapshotId) -> Result<RateTable, StorageError> {
        let path = self.path_of(id);
        parse_snapshot_file(&path).map_err(|source| StorageError::Unreadable { path, source })
    }
}

fn write_then_rename(
    table: &RateTable,
    id: SnapshotId,
    tmp: &Path,
    path: &Path,
) -> Result<(), StorageError> {
    let csv_err = |source: csv::Error| StorageError::Csv {
        path: tmp.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(tmp).map_err(csv_err)?;
    for row in table.rows() {
        wtr.serialize(SnapshotRecord::from_row(row, id.timestamp()))
            .map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| StorageError::Io {
        path: tmp.to_path_buf(),
        source,
    })?;
    drop(wtr);

    fs::rename(tmp, path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn outdated_relative_to_latest(ids: &[SnapshotId], retention_days: i64) -> Vec<SnapshotId> {
    if ids.len() < 2 {
        return Vec::new();
    }
    let Some(latest) = ids.iter().max().copied() else {
        return Vec::new();
    };
    ids.iter()
        .copied()
        .filter(|id| (latest.timestamp() - id.timestamp()).num_days() > retention_days)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SnapshotId {
        SnapshotId::parse(s).unwrap()
    }

    #[test]
    fn id_round_trips_through_file_name() {
        let a = id("2023_04_01-04_14_05");
        assert_eq!(a.to_string(), "2023_04_01-04_14_05");
        assert_eq!(a.file_name(), "2023_04_01-04_14_05.csv");
        assert!(SnapshotId::parse("2023-04-01").is_none());
        assert!(SnapshotId::parse("notes").is_none());
    }

    #[test]
    fn ordering_follows_time_not_text() {
        let mut v = vec![
            id("2023_04_05-03_21_02"),
            id("2022_12_31-23_59_59"),
            id("2023_04_01-04_14_05"),
        ];
        v.sort();
        assert_eq!(v[0], id("2022_12_31-23_59_59"));
        assert_eq!(v[2], id("2023_04_05-03_21_02"));
    }

    #[test]
    fn outdated_uses_whole_days_strictly() {
        let latest = id("2023_06_01-00_00_00");
        let ids = vec![
            id("2023_03_01-00_00_00"), // 92 days
            id("2023_04_02-00_00_00"), // exactly 60 days
            id("2023_04_01-12_00_00"), // 60 days 12 hours
            id("2023_04_01-00_00_00"), // 61 days
            latest,
        ];
        let out = outdated_relative_to_latest(&ids, 60);
        assert_eq!(out, vec![id("2023_03_01-00_00_00"), id("2023_04_01-00_00_00")]);
    }

    #[test]
    fn outdated_needs_two_snapshots() {
        assert!(outdated_relative_to_latest(&[], 0).is_empty());
        assert!(outdated_relative_to_latest(&[id("2020_01_01-00_00_00")], 0).is_empty());
    }
}
