use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::Store;
use crate::error::{VfsError, VfsResult};
use crate::path::VfsPath;
use crate::types::WriteOptions;

/// Options for [`FileHandle::writer`](super::FileHandle::writer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Start from the current content instead of an empty buffer.
    pub keep_existing: bool,
}

impl WriterOptions {
    pub fn keep_existing() -> Self {
        Self { keep_existing: true }
    }
}

/// Buffered writer over one file.
///
/// Writes land in memory and reach the adapter as a single replace on
/// [`commit`](Self::commit). The file stays write-pending until the writer
/// is committed, discarded or dropped; a second writer on the same file
/// fails with `NoModificationAllowed` meanwhile.
pub struct FileWriter {
    store: Arc<Store>,
    path: VfsPath,
    buffer: Vec<u8>,
    cursor: u64,
    committed: bool,
}

impl FileWriter {
    pub(super) async fn open(store: Arc<Store>, path: VfsPath, options: WriterOptions) -> VfsResult<Self> {
        store.acquire_writer(&path)?;
        // From here on, drop releases the registration.
        let mut writer = Self {
            store,
            path,
            buffer: Vec::new(),
            cursor: 0,
            committed: false,
        };
        if options.keep_existing {
            writer.buffer = writer
                .store
                .adapter
                .read_bytes(&writer.path.to_string())
                .await?;
        }
        debug!(path = %writer.path, keep_existing = options.keep_existing, "writer opened");
        Ok(writer)
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Buffered length.
    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write at the cursor and advance it. A cursor past the end zero-fills the gap.
    ///
    /// Fails with `QuotaExceeded`, leaving the buffer as it was, when the
    /// result would not fit in memory.
    pub fn write(&mut self, data: &[u8]) -> VfsResult<()> {
        let end = self
            .cursor
            .checked_add(data.len() as u64)
            .ok_or_else(|| VfsError::too_large(self.path.to_string(), "more than u64::MAX"))?;
        let end_index = self.index(end)?;
        self.grow(end_index)?;
        self.buffer[end_index - data.len()..end_index].copy_from_slice(data);
        self.cursor = end;
        Ok(())
    }

    /// Move the cursor. Seeking past the end is allowed.
    pub fn seek(&mut self, position: u64) {
        self.cursor = position;
    }

    /// Resize the buffer, pulling the cursor back if it is now past the end.
    pub fn truncate(&mut self, size: u64) -> VfsResult<()> {
        let len = self.index(size)?;
        if len > self.buffer.len() {
            self.grow(len)?;
        } else {
            self.buffer.truncate(len);
        }
        self.cursor = self.cursor.min(size);
        Ok(())
    }

    fn index(&self, offset: u64) -> VfsResult<usize> {
        usize::try_from(offset).map_err(|_| VfsError::too_large(self.path.to_string(), offset))
    }

    fn grow(&mut self, len: usize) -> VfsResult<()> {
        if len <= self.buffer.len() {
            return Ok(());
        }
        self.buffer
            .try_reserve_exact(len - self.buffer.len())
            .map_err(|e| VfsError::too_large(self.path.to_string(), len).with_source(e))?;
        self.buffer.resize(len, 0);
        Ok(())
    }

    /// Write the buffer to the file, replacing its content.
    pub async fn commit(mut self) -> VfsResult<()> {
        self.store
            .adapter
            .write(&self.path.to_string(), &self.buffer, WriteOptions::replace())
            .await?;
        self.committed = true;
        debug!(path = %self.path, bytes = self.buffer.len(), "writer committed");
        Ok(())
    }

    /// Throw the buffer away. The file is untouched.
    pub fn discard(self) {}
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        self.store.release_writer(&self.path);
        if !self.committed {
            debug!(path = %self.path, "writer discarded");
        }
    }
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("path", &self.path.to_string())
            .field("len", &self.buffer.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
