//! Handle-oriented navigation over an adapter.
//!
//! A tree starts at [`Directory::open`]. Every handle derived from it
//! shares one [`Store`]: the adapter plus the registry of pending
//! [`FileWriter`]s. Handles are views; they hold a path and the entry
//! identity captured when they were resolved, never content.
//!
//! Method prefixes follow one taxonomy:
//!
//! | Prefix     | Contract                                                |
//! |------------|---------------------------------------------------------|
//! | `get_`     | `Ok(None)` when absent                                  |
//! | `resolve_` | `NotFound` when absent                                  |
//! | `create_`  | directories are idempotent, files are truncated         |
//! | `has_`     | existence probe; the wrong kind counts as absent        |
//! | `remove_`  | `NotFound` when absent, `TypeMismatch` for the wrong kind |

mod directory;
mod file;
mod walk;
mod writer;

pub use directory::Directory;
pub use file::FileHandle;
pub use walk::{Walk, WalkEntry, WalkFilter, WalkOptions};
pub use writer::{FileWriter, WriterOptions};

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::adapter::Adapter;
use crate::error::{ErrorKind, VfsError, VfsResult};
use crate::path::VfsPath;
use crate::types::{EntryId, EntryKind};

/// State shared by every handle of one tree.
pub(crate) struct Store {
    pub(crate) adapter: Arc<dyn Adapter>,
    /// Files with an uncommitted writer.
    pending: Mutex<HashSet<VfsPath>>,
}

impl Store {
    pub(crate) fn new(adapter: Arc<dyn Adapter>) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            pending: Mutex::new(HashSet::new()),
        })
    }

    /// Resolve `path` into a handle of whatever kind is there.
    pub(crate) async fn lookup(self: &Arc<Self>, path: VfsPath) -> VfsResult<Entry> {
        let key = path.to_string();
        let meta = self.adapter.metadata(&key).await?;
        let id = self.adapter.entry_id(&key).await?;
        Ok(match meta.kind {
            EntryKind::File => Entry::File(FileHandle::new(self.clone(), path, id)),
            EntryKind::Directory => Entry::Directory(Directory::new(self.clone(), path, id)),
        })
    }

    /// Like [`lookup`](Self::lookup), with `NotFound` turned into `None`.
    pub(crate) async fn probe(self: &Arc<Self>, path: VfsPath) -> VfsResult<Option<Entry>> {
        match self.lookup(path).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn same_adapter(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.adapter, &other.adapter)
    }

    pub(crate) fn acquire_writer(&self, path: &VfsPath) -> VfsResult<()> {
        if self.pending.lock().insert(path.clone()) {
            Ok(())
        } else {
            Err(VfsError::new(ErrorKind::NoModificationAllowed, "a writer is already pending")
                .with_path(path.to_string()))
        }
    }

    pub(crate) fn release_writer(&self, path: &VfsPath) {
        self.pending.lock().remove(path);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("adapter", &self.adapter.name())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

/// A file or directory handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    File(FileHandle),
    Directory(Directory),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Directory(_) => EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }

    pub fn name(&self) -> &str {
        self.path().name()
    }

    pub fn path(&self) -> &VfsPath {
        match self {
            Entry::File(file) => file.path(),
            Entry::Directory(dir) => dir.path(),
        }
    }

    pub fn id(&self) -> EntryId {
        match self {
            Entry::File(file) => file.id(),
            Entry::Directory(dir) => dir.id(),
        }
    }

    pub fn as_file(&self) -> Option<&FileHandle> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<FileHandle> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn into_directory(self) -> Option<Directory> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }
}

impl From<FileHandle> for Entry {
    fn from(file: FileHandle) -> Self {
        Entry::File(file)
    }
}

impl From<Directory> for Entry {
    fn from(dir: Directory) -> Self {
        Entry::Directory(dir)
    }
}
