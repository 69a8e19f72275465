use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Directory, FileWriter, Store, WriterOptions};
use crate::adapter::Adapter;
use crate::error::{VfsError, VfsResult};
use crate::path::VfsPath;
use crate::source::FileLike;
use crate::types::{Blob, CopyOptions, EntryId, Metadata, WriteOptions};

/// A file handle backed by an adapter.
///
/// Every call goes to the adapter; writes through one handle are visible
/// through every other handle to the same file immediately.
#[derive(Clone)]
pub struct FileHandle {
    store: Arc<Store>,
    path: VfsPath,
    id: EntryId,
}

impl FileHandle {
    pub(crate) fn new(store: Arc<Store>, path: VfsPath, id: EntryId) -> Self {
        Self { store, path, id }
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.store.adapter
    }

    fn key(&self) -> String {
        self.path.to_string()
    }

    // ========================================================================
    // Reading
    // ========================================================================

    pub async fn metadata(&self) -> VfsResult<Metadata> {
        self.store.adapter.metadata(&self.key()).await
    }

    pub async fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        self.store.adapter.read_bytes(&self.key()).await
    }

    pub async fn read_text(&self) -> VfsResult<String> {
        self.store.adapter.read_text(&self.key()).await
    }

    pub async fn read_blob(&self) -> VfsResult<Blob> {
        self.store.adapter.read_blob(&self.key()).await
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Replace the whole content.
    pub async fn write(&self, data: &[u8]) -> VfsResult<()> {
        self.store
            .adapter
            .write(&self.key(), data, WriteOptions::replace())
            .await
    }

    /// Overwrite bytes starting at `position`, keeping the rest.
    pub async fn write_at(&self, position: u64, data: &[u8]) -> VfsResult<()> {
        self.store
            .adapter
            .write(&self.key(), data, WriteOptions::at(position))
            .await
    }

    pub async fn append(&self, data: &[u8]) -> VfsResult<()> {
        self.store.adapter.append(&self.key(), data).await
    }

    pub async fn truncate(&self, size: u64) -> VfsResult<()> {
        self.store.adapter.truncate(&self.key(), size).await
    }

    /// Open a buffered writer. Nothing reaches the adapter until
    /// [`FileWriter::commit`]. Only one writer per file may be pending.
    pub async fn writer(&self, options: WriterOptions) -> VfsResult<FileWriter> {
        FileWriter::open(self.store.clone(), self.path.clone(), options).await
    }

    // ========================================================================
    // Copy / move
    // ========================================================================

    /// Copy into `dest` under the same name.
    pub async fn copy_to(&self, dest: &Directory, options: CopyOptions) -> VfsResult<FileHandle> {
        self.copy_as(dest, self.name(), options).await
    }

    /// Copy to `dest/name`. `dest` may live on another adapter.
    pub async fn copy_as(&self, dest: &Directory, name: &str, options: CopyOptions) -> VfsResult<FileHandle> {
        let target = dest.path().join(name)?;
        let key = target.to_string();

        if self.store.same_adapter(dest.store()) {
            self.store.adapter.copy(&self.key(), &key, options).await?;
        } else {
            let to = &dest.store().adapter;
            if to.dir_exists(&key).await? {
                return Err(VfsError::not_a_file(key));
            }
            if !options.overwrite && to.exists(&key).await? {
                return Err(VfsError::already_exists(key));
            }
            let data = self.read_bytes().await?;
            to.write(&key, &data, WriteOptions::replace()).await?;
        }

        debug!(from = %self.path, to = %target, "copied file");
        Self::expect(dest.store(), target).await
    }

    /// Move into `dest` under the same name.
    pub async fn move_to(&self, dest: &Directory, options: CopyOptions) -> VfsResult<FileHandle> {
        self.move_as(dest, self.name(), options).await
    }

    /// Copy to `dest/name`, then remove this file. Not atomic.
    pub async fn move_as(&self, dest: &Directory, name: &str, options: CopyOptions) -> VfsResult<FileHandle> {
        let target = dest.path().join(name)?;

        if self.store.same_adapter(dest.store()) {
            self.store
                .adapter
                .move_file(&self.key(), &target.to_string(), options)
                .await?;
        } else {
            self.copy_as(dest, name, options).await?;
            self.store.adapter.remove(&self.key()).await?;
        }

        debug!(from = %self.path, to = %target, "moved file");
        Self::expect(dest.store(), target).await
    }

    async fn expect(store: &Arc<Store>, path: VfsPath) -> VfsResult<FileHandle> {
        let key = path.to_string();
        store
            .lookup(path)
            .await?
            .into_file()
            .ok_or_else(|| VfsError::not_a_file(key))
    }

    /// Host path, on adapters backed by a real filesystem.
    pub async fn native_path(&self) -> VfsResult<PathBuf> {
        self.store.adapter.native_path(&self.key()).await
    }
}

#[async_trait]
impl FileLike for FileHandle {
    fn name(&self) -> &str {
        FileHandle::name(self)
    }

    async fn metadata(&self) -> VfsResult<Metadata> {
        FileHandle::metadata(self).await
    }

    async fn read_bytes(&self) -> VfsResult<Vec<u8>> {
        FileHandle::read_bytes(self).await
    }

    async fn read_text(&self) -> VfsResult<String> {
        FileHandle::read_text(self).await
    }

    async fn read_blob(&self) -> VfsResult<Blob> {
        FileHandle::read_blob(self).await
    }

    async fn write(&self, data: &[u8]) -> VfsResult<()> {
        FileHandle::write(self, data).await
    }

    async fn append(&self, data: &[u8]) -> VfsResult<()> {
        FileHandle::append(self, data).await
    }

    async fn truncate(&self, size: u64) -> VfsResult<()> {
        FileHandle::truncate(self, size).await
    }

    async fn native_path(&self) -> VfsResult<PathBuf> {
        FileHandle::native_path(self).await
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.store.same_adapter(&other.store) && self.id == other.id
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("adapter", &self.store.adapter.name())
            .field("path", &self.path.to_string())
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryAdapter;
    use crate::error::ErrorKind;

    async fn root() -> Directory {
        Directory::open(Arc::new(MemoryAdapter::ready().await.unwrap()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hello_world_scenario() {
        let root = root().await;
        let file = root.create_file("greeting.txt").await.unwrap();
        file.write(b"Hello, World!").await.unwrap();
        assert_eq!(file.read_text().await.unwrap(), "Hello, World!");

        file.append(b" Bye").await.unwrap();
        assert_eq!(file.read_text().await.unwrap(), "Hello, World! Bye");

        file.truncate(5).await.unwrap();
        assert_eq!(file.read_text().await.unwrap(), "Hello");

        file.write_at(1, b"EL").await.unwrap();
        assert_eq!(file.read_text().await.unwrap(), "HELlo");
    }

    #[tokio::test]
    async fn test_blob_and_metadata() {
        let root = root().await;
        let file = root.create_file("page.html").await.unwrap();
        file.write(b"<p>").await.unwrap();

        let blob = file.read_blob().await.unwrap();
        assert_eq!(blob.content_type, "text/html");
        assert_eq!(blob.size(), 3);
        assert_eq!(file.metadata().await.unwrap().size, 3);
    }

    #[tokio::test]
    async fn test_identity() {
        let root = root().await;
        let a = root.create_file("x").await.unwrap();
        let b = root.resolve_file("x").await.unwrap();
        assert_eq!(a, b);

        root.remove_file("x").await.unwrap();
        let recreated = root.create_file("x").await.unwrap();
        assert_ne!(a, recreated);
    }

    #[tokio::test]
    async fn test_copy_into_other_directory() {
        let root = root().await;
        let file = root.create_file("a.txt").await.unwrap();
        file.write(b"payload").await.unwrap();
        let dest = root.create_directory("dest").await.unwrap();

        let copy = file.copy_to(&dest, CopyOptions::default()).await.unwrap();
        assert_eq!(copy.path().to_string(), "/dest/a.txt");
        assert_ne!(copy, file);
        assert_eq!(file.read_bytes().await.unwrap(), b"payload");

        let err = file.copy_to(&dest, CopyOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoModificationAllowed);

        let moved = file.move_as(&dest, "b.txt", CopyOptions::default()).await.unwrap();
        assert_eq!(moved.read_bytes().await.unwrap(), b"payload");
        assert!(!root.has_file("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_across_adapters() {
        let left = root().await;
        let right = root().await;
        let file = left.create_file("f").await.unwrap();
        file.write(b"cross").await.unwrap();

        let moved = file.move_to(&right, CopyOptions::default()).await.unwrap();
        assert_eq!(moved.read_text().await.unwrap(), "cross");
        assert!(!left.has_file("f").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_like_dispatch() {
        let root = root().await;
        let file = root.create_file("f.txt").await.unwrap();
        let like: &dyn FileLike = &file;
        like.write(b"via trait").await.unwrap();
        assert_eq!(like.read_text().await.unwrap(), "via trait");
        assert_eq!(like.name(), "f.txt");
    }
}
