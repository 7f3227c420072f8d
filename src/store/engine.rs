//! Store engine: segment roster, mutation executor, lookup, compaction,
//! recovery.
//!
//! Writes are funneled through a single executor thread, so appends to the
//! active segment and the matching index updates are strictly serialized.
//! Reads take the roster read lock only long enough to resolve a
//! (segment, offset) pair; the record itself is read with a private file
//! handle. Compaction holds the roster write lock for its whole duration,
//! which also serializes it against the executor's size check and append.

use crate::common::{sha1_hex, Error, Result};
use crate::store::entry::Entry;
use crate::store::segment::{Segment, SEGMENT_PREFIX};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

struct PutOp {
    entry: Entry,
    resp: oneshot::Sender<Result<()>>,
}

struct StoreState {
    /// Roster, oldest first; the last segment is the active one.
    segments: Vec<Arc<Segment>>,
    /// Append handle for the active segment; taken on close.
    active: Option<File>,
    /// Numeric suffix of the newest segment file ever created.
    last_index: u64,
}

struct Shared {
    dir: PathBuf,
    segment_size: u64,
    state: RwLock<StoreState>,
}

/// Log-structured key-value store over segmented append-only files.
pub struct Store {
    shared: Arc<Shared>,
    put_tx: Mutex<Option<mpsc::UnboundedSender<PutOp>>>,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Open a store in `dir`, recovering any existing segments.
    /// `segment_size` is the per-segment byte budget that triggers rollover.
    pub fn open(dir: impl Into<PathBuf>, segment_size: u64) -> Result<Self> {
        let dir = dir.into();
        if segment_size == 0 {
            return Err(Error::InvalidConfig("segment size must be positive".into()));
        }
        fs::create_dir_all(&dir)?;

        let (segments, last_index) = recover_segments(&dir)?;
        let mut state = StoreState {
            segments,
            active: None,
            last_index,
        };

        if state.segments.is_empty() {
            create_segment(&dir, &mut state)?;
        } else if let Some(last) = state.segments.last() {
            let file = OpenOptions::new().append(true).open(last.path())?;
            state.active = Some(file);
        }

        tracing::info!(
            "store opened: {} segment(s), active index {}, dir {:?}",
            state.segments.len(),
            state.last_index,
            dir
        );

        let shared = Arc::new(Shared {
            dir,
            segment_size,
            state: RwLock::new(state),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let executor_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("segkv-put".into())
            .spawn(move || run_executor(executor_shared, rx))?;

        Ok(Self {
            shared,
            put_tx: Mutex::new(Some(tx)),
            executor: Mutex::new(Some(handle)),
        })
    }

    /// Append a key/value record. Mutations are serialized through the
    /// executor; the future resolves once the record is on disk and indexed.
    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let op = PutOp {
            entry: Entry::new(key, value),
            resp: resp_tx,
        };
        {
            let tx = self.put_tx.lock().unwrap();
            match tx.as_ref() {
                Some(tx) => tx.send(op).map_err(|_| Error::Closed)?,
                None => return Err(Error::Closed),
            }
        }
        resp_rx.await.map_err(|_| Error::Closed)?
    }

    /// Look up the newest value for a key, verifying its integrity digest.
    pub fn get(&self, key: &str) -> Result<String> {
        let (segment, offset) = self.find(key)?;
        let entry = segment.read_at(offset)?;
        let actual = sha1_hex(entry.value.as_bytes());
        if actual != entry.hash {
            return Err(Error::HashMismatch {
                expected: entry.hash,
                actual,
            });
        }
        Ok(entry.value)
    }

    /// Newest-to-oldest roster scan for a key's position.
    fn find(&self, key: &str) -> Result<(Arc<Segment>, u64)> {
        let state = self.shared.state.read().unwrap();
        for segment in state.segments.iter().rev() {
            if let Some(offset) = segment.lookup(key) {
                return Ok((segment.clone(), offset));
            }
        }
        Err(Error::NotFound(key.to_string()))
    }

    /// Fold all sealed segments into a single new one holding each key's
    /// newest value. The active segment is left untouched; a key living in
    /// both keeps shadowing the compacted copy through roster order.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.shared.state.write().unwrap();
        if state.segments.len() < 2 {
            return Ok(());
        }

        let sealed: Vec<Arc<Segment>> = state.segments[..state.segments.len() - 1].to_vec();
        let active = match state.segments.last() {
            Some(segment) => segment.clone(),
            None => return Ok(()),
        };

        state.last_index += 1;
        let path = segment_path(&self.shared.dir, state.last_index);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let compacted = Arc::new(Segment::new(&path));

        // The newest sealed segment wins for every key it holds.
        let mut keep: HashMap<String, (Arc<Segment>, u64)> = HashMap::new();
        for segment in sealed.iter().rev() {
            for (key, offset) in segment.entries() {
                keep.entry(key).or_insert_with(|| (segment.clone(), offset));
            }
        }

        let mut write_offset = 0u64;
        for (key, (segment, offset)) in keep {
            let entry = match segment.read_at(offset) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping {:?} during compaction: {}", key, e);
                    continue;
                }
            };
            // Re-encoding refreshes the digest from the value.
            let frame = entry.encode();
            file.write_all(&frame)?;
            compacted.set(key, write_offset);
            write_offset += frame.len() as u64;
        }
        drop(file);

        state.segments = vec![compacted, active];

        for segment in &sealed {
            if let Err(e) = fs::remove_file(segment.path()) {
                tracing::warn!("failed to remove {:?}: {}", segment.path(), e);
            }
        }

        tracing::info!("compaction folded {} segment(s) into {:?}", sealed.len(), path);
        Ok(())
    }

    /// Stop accepting mutations and close the active file handle. Safe to
    /// call more than once.
    pub fn close(&self) -> Result<()> {
        if let Some(tx) = self.put_tx.lock().unwrap().take() {
            drop(tx);
        }
        if let Some(handle) = self.executor.lock().unwrap().take() {
            let _ = handle.join();
        }
        let mut state = self.shared.state.write().unwrap();
        if let Some(file) = state.active.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("close on drop failed: {}", e);
        }
    }
}

fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{}{}", SEGMENT_PREFIX, index))
}

/// Create the next segment file and make it the append target. The previous
/// active handle is dropped (closed) by the replacement.
fn create_segment(dir: &Path, state: &mut StoreState) -> Result<()> {
    let index = if state.segments.is_empty() {
        0
    } else {
        state.last_index + 1
    };
    let path = segment_path(dir, index);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    state.active = Some(file);
    state.last_index = index;
    state.segments.push(Arc::new(Segment::new(path)));
    Ok(())
}

/// List, order, and scan existing segment files.
fn recover_segments(dir: &Path) -> Result<(Vec<Arc<Segment>>, u64)> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let name = dirent.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(SEGMENT_PREFIX) else {
            continue;
        };
        let Ok(index) = suffix.parse::<u64>() else { continue };
        found.push((index, dirent.path()));
    }
    found.sort_by_key(|(index, _)| *index);

    let mut segments = Vec::with_capacity(found.len());
    let mut last_index = 0;
    for (index, path) in found {
        let segment = Segment::recover(&path)?;
        tracing::debug!("recovered segment {:?}: {} key(s)", path, segment.len());
        segments.push(Arc::new(segment));
        last_index = index;
    }
    Ok((segments, last_index))
}

/// Dedicated mutation executor: drains the queue one op at a time, holding
/// the roster write lock across the size check, rollover, append, and index
/// update of each op.
fn run_executor(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<PutOp>) {
    while let Some(op) = rx.blocking_recv() {
        let result = append_entry(&shared, &op.entry);
        if let Err(e) = &result {
            tracing::error!("put {:?} failed: {}", op.entry.key, e);
        }
        let _ = op.resp.send(result);
    }
}

fn append_entry(shared: &Shared, entry: &Entry) -> Result<()> {
    let mut state = shared.state.write().unwrap();

    let current_size = match state.active.as_mut() {
        Some(file) => file.seek(SeekFrom::End(0))?,
        None => return Err(Error::Closed),
    };
    if current_size + entry.encoded_len() > shared.segment_size {
        create_segment(&shared.dir, &mut state)?;
    }

    let frame = entry.encode();
    let start = match state.active.as_mut() {
        Some(file) => {
            file.write_all(&frame)?;
            file.seek(SeekFrom::End(0))? - frame.len() as u64
        }
        None => return Err(Error::Closed),
    };

    if let Some(segment) = state.segments.last() {
        segment.set(entry.key.clone(), start);
    }
    Ok(())
}
