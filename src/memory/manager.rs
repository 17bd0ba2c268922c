use crate::buffer::memory_buffer::MemoryBuffer;
use crate::foundation::core::{DataType, Rect};
use crate::foundation::error::{TilecompError, TilecompResult};
use crate::operation::core::OperationId;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cache key: one published chunk of one write-buffer operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    /// Publishing operation.
    pub operation: OperationId,
    /// Chunk index within the operation's group.
    pub chunk: usize,
}

impl CacheKey {
    /// Key for `chunk` of `operation`.
    pub fn new(operation: OperationId, chunk: usize) -> Self {
        Self { operation, chunk }
    }
}

/// Counters describing cache behaviour over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from RAM.
    pub hits: u64,
    /// Lookups served by reloading from scratch storage.
    pub reloads: u64,
    /// Buffers moved out to scratch storage.
    pub evictions: u64,
    /// Highest RAM use observed.
    pub peak_bytes: usize,
    /// Buffers published.
    pub published: u64,
}

impl CacheStats {
    /// Fraction of lookups that needed no reload; `1.0` when nothing was looked up.
    pub fn performance(&self) -> f64 {
        let total = self.hits + self.reloads;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    buffer: Option<Arc<MemoryBuffer>>,
    rect: Rect,
    data_type: DataType,
    users: u32,
    spill: Option<PathBuf>,
    seq: u64,
}

impl CacheEntry {
    fn byte_len(&self) -> usize {
        self.rect.area() as usize * self.data_type.channels() * std::mem::size_of::<f32>()
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    allocated_bytes: usize,
    next_seq: u64,
    scratch: Option<tempfile::TempDir>,
    stats: CacheStats,
}

impl CacheState {
    fn note_alloc(&mut self, bytes: usize) {
        self.allocated_bytes = self.allocated_bytes.saturating_add(bytes);
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.allocated_bytes);
    }
}

/// Budget-aware cache of published chunk buffers.
///
/// Entries nobody is reading are spilled to scratch files, oldest first, once RAM use exceeds
/// the budget; [`MemoryManager::get`] reloads them transparently. An entry with readers is never
/// spilled. All map mutations go through one mutex.
pub struct MemoryManager {
    state: Mutex<CacheState>,
    budget_bytes: usize,
    scratch_parent: Option<PathBuf>,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("budget_bytes", &self.budget_bytes)
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

/// Read access to a cached buffer. Counts as a user until dropped.
pub struct BufferGuard<'a> {
    manager: &'a MemoryManager,
    key: CacheKey,
    buffer: Arc<MemoryBuffer>,
}

impl std::ops::Deref for BufferGuard<'_> {
    type Target = MemoryBuffer;

    fn deref(&self) -> &MemoryBuffer {
        &self.buffer
    }
}

impl Drop for BufferGuard<'_> {
    fn drop(&mut self) {
        self.manager.release_user(self.key);
    }
}

impl MemoryManager {
    /// Cache holding at most `budget_bytes` in RAM. Scratch files go under `scratch_parent`
    /// (OS temp dir when `None`); the directory is created on first eviction.
    pub fn new(budget_bytes: usize, scratch_parent: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            budget_bytes,
            scratch_parent,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A poisoned cache is still structurally sound: every mutation is a few field writes.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configured RAM budget.
    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Bytes currently held in RAM by cached buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.lock().allocated_bytes
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Number of cached entries, in RAM or spilled.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// `true` when `key` is cached and currently spilled to scratch storage.
    pub fn is_evicted(&self, key: CacheKey) -> bool {
        self.lock()
            .entries
            .get(&key)
            .is_some_and(|e| e.buffer.is_none())
    }

    /// Zeroed buffer for a chunk about to be computed.
    ///
    /// Makes room for it first by spilling idle entries. The buffer is not tracked until it is
    /// handed to [`MemoryManager::publish`].
    pub fn allocate(&self, data_type: DataType, rect: Rect) -> TilecompResult<MemoryBuffer> {
        let bytes = rect.area() as usize * data_type.channels() * std::mem::size_of::<f32>();
        {
            let mut st = self.lock();
            self.evict_locked(&mut st, bytes)?;
        }
        Ok(MemoryBuffer::new(data_type, rect))
    }

    /// Register a finished buffer under `key`, replacing any previous entry.
    ///
    /// The buffer is immutable from here on.
    pub fn publish(&self, key: CacheKey, buffer: MemoryBuffer) -> TilecompResult<()> {
        let mut st = self.lock();
        if let Some(old) = st.entries.remove(&key) {
            Self::forget_locked(&mut st, old);
        }
        let seq = st.next_seq;
        st.next_seq += 1;
        let entry = CacheEntry {
            rect: buffer.rect(),
            data_type: buffer.data_type(),
            buffer: Some(Arc::new(buffer)),
            users: 0,
            spill: None,
            seq,
        };
        st.note_alloc(entry.byte_len());
        st.entries.insert(key, entry);
        st.stats.published += 1;
        self.evict_locked(&mut st, 0)?;
        Ok(())
    }

    /// Borrow the buffer under `key`, reloading it from scratch storage if it was spilled.
    ///
    /// Returns `Ok(None)` on a miss. The guard keeps the entry pinned in RAM.
    pub fn get(&self, key: CacheKey) -> TilecompResult<Option<BufferGuard<'_>>> {
        let mut st = self.lock();
        let Some(entry) = st.entries.get_mut(&key) else {
            return Ok(None);
        };
        let buffer = if let Some(buf) = entry.buffer.clone() {
            entry.users += 1;
            st.stats.hits += 1;
            buf
        } else {
            let path = entry.spill.clone().ok_or_else(|| {
                TilecompError::execution(format!(
                    "cache entry {key:?} is neither resident nor spilled"
                ))
            })?;
            let buf = Arc::new(load_spill(&path, entry.data_type, entry.rect)?);
            let _ = std::fs::remove_file(&path);
            entry.spill = None;
            entry.buffer = Some(Arc::clone(&buf));
            entry.users += 1;
            let bytes = entry.byte_len();
            st.stats.reloads += 1;
            st.note_alloc(bytes);
            tracing::debug!(?key, bytes, "reloaded chunk buffer from scratch");
            self.evict_locked(&mut st, 0)?;
            buf
        };
        Ok(Some(BufferGuard {
            manager: self,
            key,
            buffer,
        }))
    }

    /// Drop one reader of `key`. Unknown keys are ignored.
    pub fn release_user(&self, key: CacheKey) {
        let mut st = self.lock();
        if let Some(e) = st.entries.get_mut(&key) {
            e.users = e.users.saturating_sub(1);
        }
    }

    /// Forget `key`, freeing its RAM and scratch file.
    pub fn remove(&self, key: CacheKey) -> bool {
        let mut st = self.lock();
        match st.entries.remove(&key) {
            Some(e) => {
                Self::forget_locked(&mut st, e);
                true
            }
            None => false,
        }
    }

    /// Spill idle entries until RAM use fits the budget. Returns how many were spilled.
    pub fn evict_to_budget(&self) -> TilecompResult<usize> {
        let mut st = self.lock();
        self.evict_locked(&mut st, 0)
    }

    /// Drop every entry and the scratch directory.
    pub fn clear(&self) {
        let mut st = self.lock();
        st.entries.clear();
        st.allocated_bytes = 0;
        if let Some(dir) = st.scratch.take()
            && let Err(e) = dir.close()
        {
            tracing::warn!(error = %e, "failed to remove compositor scratch directory");
        }
    }

    fn forget_locked(st: &mut CacheState, entry: CacheEntry) {
        if entry.buffer.is_some() {
            st.allocated_bytes = st.allocated_bytes.saturating_sub(entry.byte_len());
        }
        if let Some(path) = entry.spill {
            let _ = std::fs::remove_file(path);
        }
    }

    fn evict_locked(&self, st: &mut CacheState, incoming: usize) -> TilecompResult<usize> {
        let mut evicted = 0usize;
        while st.allocated_bytes.saturating_add(incoming) > self.budget_bytes {
            let victim = st
                .entries
                .iter()
                .filter(|(_, e)| e.buffer.is_some() && e.users == 0)
                .min_by_key(|(_, e)| e.seq)
                .map(|(k, _)| *k);
            let Some(key) = victim else {
                if evicted == 0 && incoming == 0 {
                    tracing::debug!(
                        allocated = st.allocated_bytes,
                        budget = self.budget_bytes,
                        "cache over budget with every entry in use"
                    );
                }
                break;
            };

            if st.scratch.is_none() {
                let dir = match &self.scratch_parent {
                    Some(parent) => tempfile::Builder::new()
                        .prefix("tilecomp-scratch-")
                        .tempdir_in(parent)?,
                    None => tempfile::Builder::new().prefix("tilecomp-scratch-").tempdir()?,
                };
                st.scratch = Some(dir);
            }
            let Some(dir) = st.scratch.as_ref().map(|d| d.path().to_path_buf()) else {
                break;
            };
            let Some(entry) = st.entries.get_mut(&key) else {
                break;
            };
            let Some(buffer) = entry.buffer.take() else {
                continue;
            };
            let path = dir.join(format!("op{}_chunk{}.f32", key.operation.0, key.chunk));
            if let Err(e) = store_spill(&path, &buffer) {
                entry.buffer = Some(buffer);
                return Err(e);
            }
            entry.spill = Some(path);
            let bytes = entry.byte_len();
            st.allocated_bytes = st.allocated_bytes.saturating_sub(bytes);
            st.stats.evictions += 1;
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, allocated = st.allocated_bytes, "spilled idle chunk buffers");
        }
        Ok(evicted)
    }
}

fn store_spill(path: &std::path::Path, buffer: &MemoryBuffer) -> TilecompResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in buffer.data() {
        w.write_all(&v.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

fn load_spill(path: &std::path::Path, data_type: DataType, rect: Rect) -> TilecompResult<MemoryBuffer> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    let data = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    MemoryBuffer::from_data(data_type, rect, data)
}

#[cfg(test)]
#[path = "../../tests/unit/memory/manager.rs"]
mod tests;
