//! Storage adapter contract.
//!
//! Every backend implements [`Adapter`]. The tree layer and the
//! migration code only ever talk to this trait, so any implementation
//! is a drop-in replacement for another.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{VfsError, VfsResult};
use crate::migration::{self, ExportOptions, ImportOptions, ImportReport, Snapshot};
use crate::path::VfsPath;
use crate::types::{
    Blob, CopyOptions, DirEntry, EntryId, Metadata, Quota, RemoveOptions, WriteOptions,
};

/// Core adapter operations.
///
/// All operations are addressed by absolute path strings (`/a/b.txt`;
/// the root is `/`). Nothing is retried internally.
///
/// Failure policy: `NotFound` when the path does not resolve,
/// `TypeMismatch` when a file was expected and a directory found (or
/// the reverse), `InvalidState` when the adapter is not initialized.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Backend self-test. Never fails; returns false when unusable.
    async fn is_available(&self) -> bool;

    /// Acquire backend resources. Calling it on a ready adapter is a no-op.
    async fn init(&self) -> VfsResult<()>;

    /// Release backend resources. Idempotent, safe without `init`.
    async fn close(&self);

    // ========================================================================
    // Reading
    // ========================================================================

    /// Entry metadata.
    async fn metadata(&self, path: &str) -> VfsResult<Metadata>;

    /// Backend identity of the entry at `path`.
    async fn entry_id(&self, path: &str) -> VfsResult<EntryId>;

    /// Read entire file contents.
    async fn read_bytes(&self, path: &str) -> VfsResult<Vec<u8>>;

    /// List direct children, ordered by name.
    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// True if a file exists at `path`. A directory there yields false.
    async fn exists(&self, path: &str) -> VfsResult<bool>;

    /// True if a directory exists at `path`. A file there yields false.
    async fn dir_exists(&self, path: &str) -> VfsResult<bool>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write file contents, creating the file if missing.
    ///
    /// The parent directory must exist. See [`WriteOptions`] for
    /// replace vs. positioned semantics.
    async fn write(&self, path: &str, data: &[u8], options: WriteOptions) -> VfsResult<()>;

    /// Drop trailing bytes or zero-extend to `size`.
    async fn truncate(&self, path: &str, size: u64) -> VfsResult<()>;

    /// Remove a file.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Create a directory and any missing ancestors. Existing directories are fine.
    async fn mkdir(&self, path: &str) -> VfsResult<()>;

    /// Remove a directory. Fails without side effects if it is non-empty
    /// and `recursive` is not set.
    async fn rmdir(&self, path: &str, options: RemoveOptions) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Approximate storage usage.
    async fn quota(&self) -> VfsResult<Quota>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Read a file as UTF-8 text.
    async fn read_text(&self, path: &str) -> VfsResult<String> {
        let bytes = self.read_bytes(path).await?;
        String::from_utf8(bytes).map_err(|e| VfsError::encoding(path, e))
    }

    /// Read a file together with its presentation metadata.
    async fn read_blob(&self, path: &str) -> VfsResult<Blob> {
        let meta = self.metadata(path).await?;
        if meta.is_dir() {
            return Err(VfsError::not_a_file(path));
        }
        let data = self.read_bytes(path).await?;
        Ok(Blob {
            name: meta.name,
            content_type: meta.content_type,
            last_modified: meta.last_modified,
            data,
        })
    }

    /// Write at the current end of the file, keeping existing content.
    async fn append(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let meta = self.metadata(path).await?;
        if meta.is_dir() {
            return Err(VfsError::not_a_file(path));
        }
        self.write(path, data, WriteOptions::at(meta.size)).await
    }

    /// Copy a file by reading it fully and writing the destination.
    async fn copy(&self, src: &str, dst: &str, options: CopyOptions) -> VfsResult<()> {
        let src_path = VfsPath::parse(src)?;
        let dst_path = VfsPath::parse(dst)?;

        let meta = self.metadata(src).await?;
        if meta.is_dir() {
            return Err(VfsError::not_a_file(src));
        }

        if src_path == dst_path {
            return if options.overwrite {
                Ok(())
            } else {
                Err(VfsError::already_exists(dst))
            };
        }

        if self.dir_exists(dst).await? {
            return Err(VfsError::not_a_file(dst));
        }
        if !options.overwrite && self.exists(dst).await? {
            return Err(VfsError::already_exists(dst));
        }

        let data = self.read_bytes(src).await?;
        self.write(dst, &data, WriteOptions::replace()).await
    }

    /// Move a file: copy, then remove the source. Not atomic across crashes.
    async fn move_file(&self, src: &str, dst: &str, options: CopyOptions) -> VfsResult<()> {
        if VfsPath::parse(src)? == VfsPath::parse(dst)? {
            return self.copy(src, dst, options).await;
        }
        self.copy(src, dst, options).await?;
        self.remove(src).await
    }

    /// Host path of the entry, for backends that have one.
    async fn native_path(&self, path: &str) -> VfsResult<PathBuf> {
        Err(VfsError::not_supported(format!("{} adapter has no native paths", self.name())).with_path(path))
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Serialize the tree (or a filtered part of it) into a snapshot.
    async fn export(&self, options: &ExportOptions) -> VfsResult<Snapshot> {
        migration::export_tree(self, options).await
    }

    /// Replay a snapshot into this adapter.
    async fn import(&self, snapshot: &Snapshot, options: &ImportOptions) -> VfsResult<ImportReport> {
        migration::import_tree(self, snapshot, options).await
    }
}

/// Adapter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Lifecycle {
    #[default]
    Idle,
    Ready,
    Closed,
}

impl Lifecycle {
    /// Fail with `InvalidState` unless ready.
    pub(crate) fn ensure_ready(self, adapter: &str) -> VfsResult<()> {
        match self {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Idle => Err(VfsError::invalid_state(format!(
                "{adapter} adapter used before init"
            ))),
            Lifecycle::Closed => Err(VfsError::invalid_state(format!(
                "{adapter} adapter is closed"
            ))),
        }
    }
}
