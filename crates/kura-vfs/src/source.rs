//! Files that may or may not be backed by an adapter.
//!
//! [`FileLike`] is the surface shared by adapter-backed
//! [`FileHandle`](crate::FileHandle)s and [`SourceFile`], a read-only
//! wrapper around externally supplied bytes (an upload, a pasted buffer).

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::types::{Blob, Metadata, content_type_for, now_millis};

/// Operations every file offers.
///
/// Mutations are part of the trait so callers handle "this file cannot be
/// written" as an error, never as a silent no-op.
#[async_trait]
pub trait FileLike: Send + Sync {
    /// Logical name.
    fn name(&self) -> &str;

    async fn metadata(&self) -> VfsResult<Metadata>;

    async fn read_bytes(&self) -> VfsResult<Vec<u8>>;

    async fn read_text(&self) -> VfsResult<String> {
        let bytes = self.read_bytes().await?;
        String::from_utf8(bytes).map_err(|e| VfsError::encoding(self.name(), e))
    }

    async fn read_blob(&self) -> VfsResult<Blob>;

    /// Replace the whole content.
    async fn write(&self, data: &[u8]) -> VfsResult<()>;

    async fn append(&self, data: &[u8]) -> VfsResult<()>;

    async fn truncate(&self, size: u64) -> VfsResult<()>;

    /// Host path of the underlying resource, where one exists.
    async fn native_path(&self) -> VfsResult<PathBuf>;
}

/// Read-only file over caller-supplied bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    content_type: String,
    last_modified: i64,
    data: Arc<[u8]>,
}

impl SourceFile {
    /// Wrap `data`, guessing the content type from `name` and stamping now.
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        Self {
            content_type: content_type_for(&name).to_string(),
            name,
            last_modified: now_millis(),
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_only(&self, op: &str) -> VfsError {
        VfsError::not_supported(format!("{op} on a read-only source file")).with_path(self.name.clone())
    }
}

#[async_trait]
impl FileLike for SourceFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn metadata(&self) -> VfsResult<Metadata> {
        let mut meta = Metadata::file(self.name.clone(), self.size(), self.last_modified);
        meta.content_type = self.content_type.clone();
        Ok(meta)
    }

    async fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        Ok(self.data.to_vec())
    }

    async fn read_blob(&self) -> VfsResult<Blob> {
        Ok(Blob {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
            data: self.data.to_vec(),
        })
    }

    async fn write(&self, _data: &[u8]) -> VfsResult<()> {
        Err(self.read_only("write"))
    }

    async fn append(&self, _data: &[u8]) -> VfsResult<()> {
        Err(self.read_only("append"))
    }

    async fn truncate(&self, _size: u64) -> VfsResult<()> {
        Err(self.read_only("truncate"))
    }

    async fn native_path(&self) -> VfsResult<PathBuf> {
        Err(self.read_only("native path"))
    }
}
