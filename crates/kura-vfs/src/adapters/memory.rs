//! In-memory adapter.
//!
//! Used for scratch trees and testing. All data is ephemeral and is
//! dropped on `close`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::adapter::{Adapter, Lifecycle};
use crate::error::{ErrorKind, VfsError, VfsResult};
use crate::path::VfsPath;
use crate::types::{
    DirEntry, EntryId, EntryKind, Metadata, Quota, RemoveOptions, WriteOptions, next_modified,
    now_millis,
};

/// Distinguishes entry ids across memory adapter instances.
static NEXT_DEVICE: AtomicU64 = AtomicU64::new(1);

/// Node in the memory tree.
#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        object: u64,
        modified: i64,
    },
    Directory {
        object: u64,
        modified: i64,
    },
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File { .. } => EntryKind::File,
            Node::Directory { .. } => EntryKind::Directory,
        }
    }

    fn object(&self) -> u64 {
        match self {
            Node::File { object, .. } | Node::Directory { object, .. } => *object,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lifecycle: Lifecycle,
    /// Keyed by path; segment ordering keeps every subtree contiguous.
    nodes: BTreeMap<VfsPath, Node>,
    next_object: u64,
    usage: u64,
}

impl MemoryState {
    fn reset(&mut self) {
        self.nodes.clear();
        self.usage = 0;
        let object = self.allocate();
        self.nodes.insert(
            VfsPath::root(),
            Node::Directory {
                object,
                modified: now_millis(),
            },
        );
    }

    fn allocate(&mut self) -> u64 {
        self.next_object += 1;
        self.next_object
    }

    fn node(&self, path: &VfsPath) -> VfsResult<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| VfsError::not_found(path.to_string()))
    }

    /// The parent of `path` must be an existing directory.
    fn ensure_parent(&self, path: &VfsPath) -> VfsResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match self.node(&parent)? {
            Node::Directory { .. } => Ok(()),
            Node::File { .. } => Err(VfsError::not_a_directory(parent.to_string())),
        }
    }

    /// Paths strictly below `path`, in order.
    fn descendants(&self, path: &VfsPath) -> Vec<VfsPath> {
        self.nodes
            .range(path.clone()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(path))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn touch(&mut self, path: &VfsPath) {
        if let Some(Node::Directory { modified, .. }) = self.nodes.get_mut(path) {
            *modified = next_modified(*modified);
        }
    }
}

/// Byte offset as an index, or `QuotaExceeded` where it does not fit.
fn to_index(path: &VfsPath, offset: u64) -> VfsResult<usize> {
    usize::try_from(offset).map_err(|_| VfsError::too_large(path.to_string(), offset))
}

/// Zero-extend `buf` to `len`, failing instead of aborting when the
/// allocation cannot be made.
fn grow(path: &VfsPath, buf: &mut Vec<u8>, len: usize) -> VfsResult<()> {
    if len <= buf.len() {
        return Ok(());
    }
    buf.try_reserve_exact(len - buf.len())
        .map_err(|e| VfsError::too_large(path.to_string(), len).with_source(e))?;
    buf.resize(len, 0);
    Ok(())
}

/// In-memory adapter.
///
/// Thread-safe via an internal `RwLock`. An optional byte capacity makes
/// writes beyond it fail with `QuotaExceeded`.
#[derive(Debug)]
pub struct MemoryAdapter {
    device: u64,
    capacity: Option<u64>,
    state: RwLock<MemoryState>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create a new, idle in-memory adapter with no capacity limit.
    pub fn new() -> Self {
        Self {
            device: NEXT_DEVICE.fetch_add(1, Ordering::Relaxed),
            capacity: None,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Create an adapter that refuses to hold more than `bytes` of file content.
    pub fn with_capacity(bytes: u64) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::new()
        }
    }

    /// Create and initialize in one step.
    pub async fn ready() -> VfsResult<Self> {
        let adapter = Self::new();
        adapter.init().await?;
        Ok(adapter)
    }

    fn check_capacity(&self, path: &VfsPath, usage: u64) -> VfsResult<()> {
        match self.capacity {
            Some(capacity) if usage > capacity => {
                Err(VfsError::quota_exceeded(path.to_string(), usage, capacity))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn init(&self) -> VfsResult<()> {
        let mut state = self.state.write();
        if state.lifecycle != Lifecycle::Ready {
            state.reset();
            state.lifecycle = Lifecycle::Ready;
            info!(device = self.device, "memory adapter ready");
        }
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.write();
        if state.lifecycle == Lifecycle::Ready {
            state.nodes.clear();
            state.usage = 0;
            info!(device = self.device, "memory adapter closed");
        }
        if state.lifecycle != Lifecycle::Idle {
            state.lifecycle = Lifecycle::Closed;
        }
    }

    async fn metadata(&self, path: &str) -> VfsResult<Metadata> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;

        Ok(match state.node(&path)? {
            Node::File { data, modified, .. } => {
                Metadata::file(path.name(), data.len() as u64, *modified)
            }
            Node::Directory { modified, .. } => Metadata::directory(path.name(), *modified),
        })
    }

    async fn entry_id(&self, path: &str) -> VfsResult<EntryId> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;

        Ok(EntryId {
            device: self.device,
            object: state.node(&path)?.object(),
        })
    }

    async fn read_bytes(&self, path: &str) -> VfsResult<Vec<u8>> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;

        match state.node(&path)? {
            Node::File { data, .. } => Ok(data.clone()),
            Node::Directory { .. } => Err(VfsError::not_a_file(path.to_string())),
        }
    }

    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;

        if let Node::File { .. } = state.node(&path)? {
            return Err(VfsError::not_a_directory(path.to_string()));
        }

        let depth = path.len() + 1;
        Ok(state
            .nodes
            .range(path.clone()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(&path))
            .filter(|(p, _)| p.len() == depth)
            .map(|(p, node)| DirEntry::new(p.name(), node.kind()))
            .collect())
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;
        Ok(matches!(state.nodes.get(&path), Some(Node::File { .. })))
    }

    async fn dir_exists(&self, path: &str) -> VfsResult<bool> {
        let path = VfsPath::parse(path)?;
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;
        Ok(matches!(state.nodes.get(&path), Some(Node::Directory { .. })))
    }

    async fn write(&self, path: &str, data: &[u8], options: WriteOptions) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        let mut state = self.state.write();
        state.lifecycle.ensure_ready(self.name())?;

        if path.is_root() {
            return Err(VfsError::not_a_file(path.to_string()));
        }
        state.ensure_parent(&path)?;

        let (previous, old_len, prior_modified) = match state.nodes.get(&path) {
            Some(Node::Directory { .. }) => {
                return Err(VfsError::not_a_file(path.to_string()));
            }
            Some(Node::File {
                data,
                modified,
                ..
            }) => (Some(data.as_slice()), data.len() as u64, *modified),
            None => (None, 0, 0),
        };

        // Size everything as u64 and check capacity before allocating.
        let (start, new_len) = match options.position {
            None => (0, data.len() as u64),
            Some(position) => {
                let end = position
                    .checked_add(data.len() as u64)
                    .ok_or_else(|| VfsError::too_large(path.to_string(), "more than u64::MAX"))?;
                let kept = if options.keep_existing { old_len } else { 0 };
                (position, end.max(kept))
            }
        };
        let usage = (state.usage - old_len)
            .checked_add(new_len)
            .ok_or_else(|| VfsError::too_large(path.to_string(), new_len))?;
        self.check_capacity(&path, usage)?;

        let content = match options.position {
            None => data.to_vec(),
            Some(_) => {
                let end = to_index(&path, start + data.len() as u64)?;
                let start = end - data.len();
                let mut base = match previous {
                    Some(existing) if options.keep_existing => existing.to_vec(),
                    _ => Vec::new(),
                };
                grow(&path, &mut base, end)?;
                base[start..end].copy_from_slice(data);
                base
            }
        };

        let len = content.len();
        match state.nodes.get_mut(&path) {
            Some(Node::File {
                data: file_data,
                modified,
                ..
            }) => {
                *file_data = content;
                *modified = next_modified(prior_modified);
            }
            _ => {
                let object = state.allocate();
                state.nodes.insert(
                    path.clone(),
                    Node::File {
                        data: content,
                        object,
                        modified: now_millis(),
                    },
                );
                if let Some(parent) = path.parent() {
                    state.touch(&parent);
                }
            }
        }
        state.usage = usage;

        debug!(path = %path, bytes = len, position = ?options.position, "memory write");
        Ok(())
    }

    async fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        let mut state = self.state.write();
        state.lifecycle.ensure_ready(self.name())?;

        let old_len = match state.node(&path)? {
            Node::File { data, .. } => data.len() as u64,
            Node::Directory { .. } => return Err(VfsError::not_a_file(path.to_string())),
        };
        let usage = (state.usage - old_len)
            .checked_add(size)
            .ok_or_else(|| VfsError::too_large(path.to_string(), size))?;
        self.check_capacity(&path, usage)?;
        let len = to_index(&path, size)?;

        if let Some(Node::File { data, modified, .. }) = state.nodes.get_mut(&path) {
            if len > data.len() {
                grow(&path, data, len)?;
            } else {
                data.truncate(len);
            }
            *modified = next_modified(*modified);
        }
        state.usage = usage;

        debug!(path = %path, size, "memory truncate");
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        let mut state = self.state.write();
        state.lifecycle.ensure_ready(self.name())?;

        match state.node(&path)? {
            Node::Directory { .. } => Err(VfsError::not_a_file(path.to_string())),
            Node::File { data, .. } => {
                let len = data.len() as u64;
                state.nodes.remove(&path);
                state.usage -= len;
                if let Some(parent) = path.parent() {
                    state.touch(&parent);
                }
                debug!(path = %path, "memory remove");
                Ok(())
            }
        }
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        let mut state = self.state.write();
        state.lifecycle.ensure_ready(self.name())?;

        // Check the whole chain before creating anything.
        for step in path.ancestors().chain(std::iter::once(path.clone())) {
            if let Some(Node::File { .. }) = state.nodes.get(&step) {
                return Err(VfsError::not_a_directory(step.to_string()));
            }
        }

        for step in path.ancestors().chain(std::iter::once(path.clone())) {
            if !state.nodes.contains_key(&step) {
                let object = state.allocate();
                state.nodes.insert(
                    step.clone(),
                    Node::Directory {
                        object,
                        modified: now_millis(),
                    },
                );
                if let Some(parent) = step.parent() {
                    state.touch(&parent);
                }
                debug!(path = %step, "memory mkdir");
            }
        }
        Ok(())
    }

    async fn rmdir(&self, path: &str, options: RemoveOptions) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        let mut state = self.state.write();
        state.lifecycle.ensure_ready(self.name())?;

        if path.is_root() {
            return Err(VfsError::new(ErrorKind::NotAllowed, "cannot remove root").with_path("/"));
        }
        if let Node::File { .. } = state.node(&path)? {
            return Err(VfsError::not_a_directory(path.to_string()));
        }

        let descendants = state.descendants(&path);
        if !descendants.is_empty() && !options.recursive {
            return Err(VfsError::directory_not_empty(path.to_string()));
        }

        for child in descendants {
            if let Some(Node::File { data, .. }) = state.nodes.remove(&child) {
                state.usage -= data.len() as u64;
            }
        }
        state.nodes.remove(&path);
        if let Some(parent) = path.parent() {
            state.touch(&parent);
        }

        debug!(path = %path, recursive = options.recursive, "memory rmdir");
        Ok(())
    }

    async fn quota(&self) -> VfsResult<Quota> {
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;
        Ok(match self.capacity {
            Some(capacity) => Quota::new(state.usage, capacity),
            None => Quota {
                usage: state.usage,
                ..Quota::unknown()
            },
        })
    }
}
