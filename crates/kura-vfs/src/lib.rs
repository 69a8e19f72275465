//! Path-addressed virtual filesystem.
//!
//! A uniform tree of files and directories over interchangeable storage
//! adapters:
//!
//! - [`Adapter`]: the contract every backend implements, addressed by
//!   absolute path strings
//! - [`MemoryAdapter`] and [`LocalAdapter`]: the bundled backends
//! - [`Directory`] / [`FileHandle`]: handle-oriented navigation with
//!   get/resolve/create/has/remove lookups, path composition, lazy
//!   [`Walk`]s, and copy/move
//! - [`Snapshot`]: backend-agnostic export/import for migrating a tree
//!   between adapters
//!
//! ```no_run
//! # async fn demo() -> kura_vfs::VfsResult<()> {
//! use std::sync::Arc;
//! use kura_vfs::{Directory, MemoryAdapter};
//!
//! let root = Directory::open(Arc::new(MemoryAdapter::ready().await?)).await?;
//! let notes = root.create_path(&["docs", "notes"]).await?;
//! notes.create_file("todo.txt").await?.write(b"ship it").await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod adapters;
pub mod error;
pub mod migration;
pub mod path;
pub mod source;
pub mod tree;
pub mod types;

pub use adapter::Adapter;
pub use adapters::{LocalAdapter, MemoryAdapter};
pub use error::{ErrorKind, VfsError, VfsResult};
pub use migration::{
    ExportOptions, ImportOptions, ImportReport, MergeBehavior, SNAPSHOT_VERSION, Snapshot, SnapshotEntry,
    SnapshotFormat, SnapshotSummary,
};
pub use path::VfsPath;
pub use source::{FileLike, SourceFile};
pub use tree::{Directory, Entry, FileHandle, FileWriter, Walk, WalkEntry, WalkFilter, WalkOptions, WriterOptions};
pub use types::{Blob, CopyOptions, DirEntry, EntryId, EntryKind, Metadata, Quota, RemoveOptions, WriteOptions};
