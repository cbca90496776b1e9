use crate::errors::CacheError;
use crate::model::Entry;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

pub const CACHE_FILE: &str = "entries.json";

/// The last committed set of entries and when it was captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub captured_at: SystemTime,
}

impl Snapshot {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            captured_at: SystemTime::now(),
        }
    }

    /// Time since capture. A capture time in the future counts as fresh.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.captured_at)
            .unwrap_or_default()
    }
}

/// File-backed snapshot store shared by every `dfx` process.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the cache file, so readers see either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whatever was last committed. A missing or unreadable file is reported as
    /// no snapshot.
    pub fn read(&self) -> Option<Snapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring corrupt cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Replace the snapshot with `entries`, stamped with the current time.
    pub fn write(&self, entries: Vec<Entry>) -> Result<Snapshot, CacheError> {
        let snapshot = Snapshot::new(entries);
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_err = |source: std::io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let encoded = serde_json::to_vec(&snapshot)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&encoded).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(
            "Committed {} entries to {:?}",
            snapshot.entries.len(),
            self.path
        );
        Ok(snapshot)
    }

    /// Age of the committed snapshot, `None` if there is none.
    pub fn age(&self) -> Option<Duration> {
        self.read().map(|s| s.age())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryKind;

    fn entries() -> Vec<Entry> {
        vec![
            Entry::new(EntryKind::Favorite, "/Users/alice/Desktop", None),
            Entry::new(EntryKind::RecentFile, "/Users/alice/todo.txt", None),
        ]
    }

    #[test]
    fn test_read_without_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());
        assert!(store.read().is_none());
        assert!(store.age().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());

        store.write(entries()).unwrap();

        let snapshot = store.read().unwrap();
        assert_eq!(snapshot.entries, entries());
        assert_eq!(snapshot.entries[1].name(), "todo.txt");
        assert!(store.age().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn test_write_replaces_whole_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());

        store.write(entries()).unwrap();
        store
            .write(vec![Entry::new(EntryKind::RecentFolder, "/tmp", None)])
            .unwrap();

        let snapshot = store.read().unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].path(), "/tmp");
    }

    #[test]
    fn test_write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(&dir.path().join("nested").join("cache"));
        store.write(entries()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_corrupt_cache_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.read().is_none());
    }

    #[test]
    fn test_snapshot_age_tracks_capture_time() {
        let mut snapshot = Snapshot::new(entries());
        snapshot.captured_at = SystemTime::now() - Duration::from_secs(60);
        assert!(snapshot.age() >= Duration::from_secs(60));

        snapshot.captured_at = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(snapshot.age(), Duration::ZERO);
    }

    #[test]
    fn test_read_during_writes_sees_whole_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::in_dir(dir.path());
        let batch = |n: usize| -> Vec<Entry> {
            (0..n)
                .map(|i| Entry::new(EntryKind::RecentFile, &format!("/tmp/file-{}.txt", i), None))
                .collect()
        };
        store.write(batch(50)).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for round in 0..200 {
                    let size = if round % 2 == 0 { 100 } else { 50 };
                    store.write(batch(size)).unwrap();
                }
            })
        };

        let mut reads = 0;
        while !writer.is_finished() || reads < 200 {
            let snapshot = store.read().expect("snapshot missing during write");
            let len = snapshot.entries.len();
            assert!(len == 50 || len == 100, "partial snapshot with {} entries", len);
            assert_eq!(snapshot.entries[len - 1].name(), format!("file-{}.txt", len - 1));
            reads += 1;
        }
        writer.join().unwrap();
    }
}
