//! A single on-disk segment: one append-only file plus its in-memory
//! key → start-offset index.
//!
//! The index is not persisted; it is rebuilt by a sequential scan on open.

use crate::common::{Error, Result};
use crate::store::entry::{read_frame, Entry};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Segment file name prefix; the decimal suffix orders recovery.
pub const SEGMENT_PREFIX: &str = "current-data";

pub struct Segment {
    path: PathBuf,
    // Interior lock: the active segment's index is written by the mutation
    // executor while readers hold only the roster read lock.
    index: RwLock<HashMap<String, u64>>,
}

impl Segment {
    /// An empty segment for a freshly created file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a segment's index by scanning its file from offset zero.
    /// Clean EOF ends the scan; within the segment, later records shadow
    /// earlier ones.
    pub fn recover(path: impl Into<PathBuf>) -> Result<Self> {
        let segment = Self::new(path);
        let file = File::open(&segment.path)?;
        let mut reader = BufReader::new(file);
        let mut offset = 0u64;
        {
            let mut index = segment.index.write().unwrap();
            while let Some(frame) = read_frame(&mut reader)? {
                let entry = Entry::decode(&frame)?;
                index.insert(entry.key, offset);
                offset += frame.len() as u64;
            }
        }
        Ok(segment)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start offset of the newest record for a key, if present.
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.index.read().unwrap().get(key).copied()
    }

    /// Record a key's start offset (newest write wins).
    pub fn set(&self, key: String, offset: u64) {
        self.index.write().unwrap().insert(key, offset);
    }

    /// Snapshot of every indexed key and its offset.
    pub fn entries(&self) -> Vec<(String, u64)> {
        self.index
            .read()
            .unwrap()
            .iter()
            .map(|(key, offset)| (key.clone(), *offset))
            .collect()
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.index.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().unwrap().is_empty()
    }

    /// Positional read of one record. Each call opens its own handle so
    /// concurrent reads never share seek state.
    pub fn read_at(&self, offset: u64) -> Result<Entry> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);
        let frame = read_frame(&mut reader)?
            .ok_or_else(|| Error::Corrupted(format!("no record at offset {}", offset)))?;
        Entry::decode(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_frames(path: &Path, entries: &[Entry]) -> Vec<u64> {
        let mut file = File::create(path).unwrap();
        let mut offsets = Vec::new();
        let mut offset = 0u64;
        for entry in entries {
            let frame = entry.encode();
            file.write_all(&frame).unwrap();
            offsets.push(offset);
            offset += frame.len() as u64;
        }
        offsets
    }

    #[test]
    fn test_recover_builds_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("{}0", SEGMENT_PREFIX));
        let entries = vec![Entry::new("k1", "v1"), Entry::new("k2", "v2")];
        let offsets = write_frames(&path, &entries);

        let segment = Segment::recover(&path).unwrap();
        assert_eq!(segment.len(), 2);
        assert_eq!(segment.lookup("k1"), Some(offsets[0]));
        assert_eq!(segment.lookup("k2"), Some(offsets[1]));
        assert_eq!(segment.lookup("missing"), None);
    }

    #[test]
    fn test_recover_latest_wins_within_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("{}0", SEGMENT_PREFIX));
        let entries = vec![Entry::new("k", "old"), Entry::new("k", "new")];
        let offsets = write_frames(&path, &entries);

        let segment = Segment::recover(&path).unwrap();
        assert_eq!(segment.len(), 1);
        assert_eq!(segment.lookup("k"), Some(offsets[1]));
        assert_eq!(segment.read_at(offsets[1]).unwrap().value, "new");
    }

    #[test]
    fn test_read_at_returns_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("{}0", SEGMENT_PREFIX));
        let entries = vec![Entry::new("k1", "v1"), Entry::new("k2", "v2")];
        let offsets = write_frames(&path, &entries);

        let segment = Segment::recover(&path).unwrap();
        let entry = segment.read_at(offsets[1]).unwrap();
        assert_eq!(entry.key, "k2");
        assert_eq!(entry.value, "v2");
    }

    #[test]
    fn test_recover_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("{}0", SEGMENT_PREFIX));
        let frame = Entry::new("k", "v").encode();
        let mut file = File::create(&path).unwrap();
        file.write_all(&frame[..frame.len() - 5]).unwrap();
        drop(file);

        assert!(matches!(
            Segment::recover(&path),
            Err(Error::Corrupted(_))
        ));
    }
}
