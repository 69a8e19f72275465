use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Entry, FileHandle, Store, Walk, WalkOptions};
use crate::adapter::Adapter;
use crate::error::{VfsError, VfsResult};
use crate::path::VfsPath;
use crate::source::FileLike;
use crate::types::{CopyOptions, EntryId, Metadata, RemoveOptions, WriteOptions};

/// A directory handle.
///
/// Equality is entry identity: two handles are equal when they sit on the
/// same adapter and resolved to the same backend object, however they
/// were reached.
#[derive(Clone)]
pub struct Directory {
    store: Arc<Store>,
    path: VfsPath,
    id: EntryId,
}

impl Directory {
    pub(crate) fn new(store: Arc<Store>, path: VfsPath, id: EntryId) -> Self {
        Self { store, path, id }
    }

    /// Open the root of a tree over an initialized adapter.
    pub async fn open(adapter: Arc<dyn Adapter>) -> VfsResult<Self> {
        Self::open_at(adapter, "/").await
    }

    /// Open the directory at `path` as the start of a new tree. Handle
    /// paths stay absolute within the adapter.
    pub async fn open_at(adapter: Arc<dyn Adapter>, path: &str) -> VfsResult<Self> {
        let path = VfsPath::parse(path)?;
        let store = Store::new(adapter);
        let key = path.to_string();
        match store.lookup(path).await? {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(VfsError::not_a_directory(key)),
        }
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

    pub(super) fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub async fn metadata(&self) -> VfsResult<Metadata> {
        self.store.adapter.metadata(&self.path.to_string()).await
    }

    /// Handles for every direct child, in listing order.
    pub async fn entries(&self) -> VfsResult<Vec<Entry>> {
        let listing = self.store.adapter.list(&self.path.to_string()).await?;
        let mut entries = Vec::with_capacity(listing.len());
        for child in listing {
            // Children can vanish between listing and lookup.
            if let Some(entry) = self.store.probe(self.path.join(&child.name)?).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    // ========================================================================
    // get / resolve
    // ========================================================================

    pub async fn get_entry(&self, name: &str) -> VfsResult<Option<Entry>> {
        self.store.probe(self.path.join(name)?).await
    }

    /// `Ok(None)` when absent; `TypeMismatch` when `name` is a directory.
    pub async fn get_file(&self, name: &str) -> VfsResult<Option<FileHandle>> {
        match self.get_entry(name).await? {
            Some(Entry::File(file)) => Ok(Some(file)),
            Some(Entry::Directory(dir)) => Err(VfsError::not_a_file(dir.path.to_string())),
            None => Ok(None),
        }
    }

    /// `Ok(None)` when absent; `TypeMismatch` when `name` is a file.
    pub async fn get_directory(&self, name: &str) -> VfsResult<Option<Directory>> {
        match self.get_entry(name).await? {
            Some(Entry::Directory(dir)) => Ok(Some(dir)),
            Some(Entry::File(file)) => Err(VfsError::not_a_directory(file.path().to_string())),
            None => Ok(None),
        }
    }

    pub async fn resolve_entry(&self, name: &str) -> VfsResult<Entry> {
        self.get_entry(name)
            .await?
            .ok_or_else(|| self.missing(name))
    }

    pub async fn resolve_file(&self, name: &str) -> VfsResult<FileHandle> {
        self.get_file(name).await?.ok_or_else(|| self.missing(name))
    }

    pub async fn resolve_directory(&self, name: &str) -> VfsResult<Directory> {
        self.get_directory(name)
            .await?
            .ok_or_else(|| self.missing(name))
    }

    fn missing(&self, name: &str) -> VfsError {
        match self.path.join(name) {
            Ok(path) => VfsError::not_found(path.to_string()),
            Err(e) => e,
        }
    }

    // ========================================================================
    // has
    // ========================================================================

    pub async fn has_entry(&self, name: &str) -> VfsResult<bool> {
        Ok(self.get_entry(name).await?.is_some())
    }

    pub async fn has_file(&self, name: &str) -> VfsResult<bool> {
        self.store
            .adapter
            .exists(&self.path.join(name)?.to_string())
            .await
    }

    pub async fn has_directory(&self, name: &str) -> VfsResult<bool> {
        self.store
            .adapter
            .dir_exists(&self.path.join(name)?.to_string())
            .await
    }

    // ========================================================================
    // create
    // ========================================================================

    /// Create an empty file, truncating it if it already exists.
    pub async fn create_file(&self, name: &str) -> VfsResult<FileHandle> {
        let path = self.path.join(name)?;
        self.store
            .adapter
            .write(&path.to_string(), &[], WriteOptions::replace())
            .await?;
        self.expect_file(path).await
    }

    /// Create a directory, or return the existing one.
    pub async fn create_directory(&self, name: &str) -> VfsResult<Directory> {
        let path = self.path.join(name)?;
        self.store.adapter.mkdir(&path.to_string()).await?;
        self.expect_directory(path).await
    }

    /// Create `name` with the content of any readable file, for example a
    /// [`SourceFile`](crate::SourceFile).
    pub async fn create_file_from(
        &self,
        name: &str,
        source: &dyn FileLike,
        options: CopyOptions,
    ) -> VfsResult<FileHandle> {
        let path = self.path.join(name)?;
        let key = path.to_string();
        if self.store.adapter.dir_exists(&key).await? {
            return Err(VfsError::not_a_file(key));
        }
        if !options.overwrite && self.store.adapter.exists(&key).await? {
            return Err(VfsError::already_exists(key));
        }

        let data = source.read_bytes().await?;
        self.store
            .adapter
            .write(&key, &data, WriteOptions::replace())
            .await?;
        debug!(path = %path, from = source.name(), "created file from source");
        self.expect_file(path).await
    }

    async fn expect_file(&self, path: VfsPath) -> VfsResult<FileHandle> {
        let key = path.to_string();
        self.store
            .lookup(path)
            .await?
            .into_file()
            .ok_or_else(|| VfsError::not_a_file(key))
    }

    async fn expect_directory(&self, path: VfsPath) -> VfsResult<Directory> {
        let key = path.to_string();
        self.store
            .lookup(path)
            .await?
            .into_directory()
            .ok_or_else(|| VfsError::not_a_directory(key))
    }

    // ========================================================================
    // remove
    // ========================================================================

    pub async fn remove_file(&self, name: &str) -> VfsResult<()> {
        let path = self.path.join(name)?;
        self.store.adapter.remove(&path.to_string()).await
    }

    /// Remove a child directory; a non-empty one needs `recursive`.
    pub async fn remove_directory(&self, name: &str, options: RemoveOptions) -> VfsResult<()> {
        let path = self.path.join(name)?;
        self.store.adapter.rmdir(&path.to_string(), options).await
    }

    /// Remove whatever `name` is.
    pub async fn remove_entry(&self, name: &str, options: RemoveOptions) -> VfsResult<()> {
        match self.resolve_entry(name).await? {
            Entry::File(_) => self.remove_file(name).await,
            Entry::Directory(_) => self.remove_directory(name, options).await,
        }
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Follow `segments` from here. Any missing segment, or a segment
    /// under a file, makes the whole lookup `Ok(None)`.
    pub async fn resolve_path(&self, segments: &[&str]) -> VfsResult<Option<Entry>> {
        let Some((last, intermediate)) = segments.split_last() else {
            return Ok(Some(Entry::Directory(self.clone())));
        };

        let mut current = self.clone();
        for segment in intermediate {
            match current.get_entry(segment).await? {
                Some(Entry::Directory(dir)) => current = dir,
                _ => return Ok(None),
            }
        }
        current.get_entry(last).await
    }

    /// `mkdir -p` for `segments`, returning the final directory.
    pub async fn create_path(&self, segments: &[&str]) -> VfsResult<Directory> {
        let mut current = self.clone();
        for segment in segments {
            current = current.create_directory(segment).await?;
        }
        Ok(current)
    }

    /// Lazy depth-first walk of everything below this directory.
    pub fn walk(&self, options: WalkOptions) -> Walk {
        Walk::new(self.store.clone(), self.path.clone(), options)
    }

    // ========================================================================
    // Copy / move
    // ========================================================================

    /// Copy the file `from` to `to`, both in this directory.
    pub async fn copy_file(&self, from: &str, to: &str, options: CopyOptions) -> VfsResult<FileHandle> {
        self.resolve_file(from).await?.copy_as(self, to, options).await
    }

    /// Rename the file `from` to `to` within this directory.
    pub async fn move_file(&self, from: &str, to: &str, options: CopyOptions) -> VfsResult<FileHandle> {
        self.resolve_file(from).await?.move_as(self, to, options).await
    }

    /// Copy this directory and everything below it into `dest`, keeping its name.
    pub async fn copy_to(&self, dest: &Directory, options: CopyOptions) -> VfsResult<Directory> {
        self.copy_as(dest, self.name(), options).await
    }

    /// Copy this directory and everything below it to `dest/name`.
    ///
    /// `dest` may live on another adapter. An existing destination is an
    /// error unless `overwrite` is set, in which case it is replaced.
    pub async fn copy_as(&self, dest: &Directory, name: &str, options: CopyOptions) -> VfsResult<Directory> {
        let target = dest.path.join(name)?;
        let target_key = target.to_string();
        let same_adapter = self.store.same_adapter(&dest.store);

        if same_adapter && (target.starts_with(&self.path) || self.path.starts_with(&target)) {
            return Err(VfsError::invalid_state(format!(
                "cannot copy {} onto {target}: paths overlap",
                self.path
            ))
            .with_path(target_key));
        }

        let to = &dest.store.adapter;
        if let Some(existing) = dest.store.probe(target.clone()).await? {
            if !options.overwrite {
                return Err(VfsError::already_exists(target_key));
            }
            match existing {
                Entry::File(_) => to.remove(&target_key).await?,
                Entry::Directory(_) => to.rmdir(&target_key, RemoveOptions::recursive()).await?,
            }
        }

        to.mkdir(&target_key).await?;
        let mut walk = self.walk(WalkOptions::default());
        let mut files = 0usize;
        while let Some(item) = walk.next().await {
            let item = item?;
            let Some(dst) = item.entry.path().rebase(&self.path, &target) else {
                continue;
            };
            match &item.entry {
                Entry::Directory(_) => to.mkdir(&dst.to_string()).await?,
                Entry::File(file) => {
                    let data = file.read_bytes().await?;
                    to.write(&dst.to_string(), &data, WriteOptions::replace())
                        .await?;
                    files += 1;
                }
            }
        }

        debug!(from = %self.path, to = %target, files, "copied directory");
        dest.expect_directory(target).await
    }

    /// Copy into `dest`, then remove this directory. Not atomic.
    pub async fn move_to(&self, dest: &Directory, options: CopyOptions) -> VfsResult<Directory> {
        self.move_as(dest, self.name(), options).await
    }

    pub async fn move_as(&self, dest: &Directory, name: &str, options: CopyOptions) -> VfsResult<Directory> {
        let moved = self.copy_as(dest, name, options).await?;
        self.store
            .adapter
            .rmdir(&self.path.to_string(), RemoveOptions::recursive())
            .await?;
        Ok(moved)
    }

    /// Host path, on adapters backed by a real filesystem.
    pub async fn native_path(&self) -> VfsResult<PathBuf> {
        self.store.adapter.native_path(&self.path.to_string()).await
    }
}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        self.store.same_adapter(&other.store) && self.id == other.id
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("adapter", &self.store.adapter.name())
            .field("path", &self.path.to_string())
            .field("id", &self.id)
            .finish()
    }
}
