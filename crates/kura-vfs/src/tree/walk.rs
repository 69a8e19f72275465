use futures::Stream;
use std::fmt;
use std::sync::Arc;
use std::vec;

use super::{Entry, Store};
use crate::error::VfsResult;
use crate::path::VfsPath;
use crate::types::DirEntry;

/// Walk predicate, called with each entry and its depth.
pub type WalkFilter = Arc<dyn Fn(&Entry, usize) -> bool + Send + Sync>;

/// Options for [`Directory::walk`](super::Directory::walk).
#[derive(Clone)]
pub struct WalkOptions {
    /// Deepest depth to yield. Direct children are depth 0.
    pub max_depth: Option<usize>,
    pub include_files: bool,
    pub include_directories: bool,
    /// Entries rejected here are neither yielded nor descended into.
    pub filter: Option<WalkFilter>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_files: true,
            include_directories: true,
            filter: None,
        }
    }
}

impl WalkOptions {
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn files_only(mut self) -> Self {
        self.include_files = true;
        self.include_directories = false;
        self
    }

    pub fn directories_only(mut self) -> Self {
        self.include_files = false;
        self.include_directories = true;
        self
    }

    pub fn filter(mut self, filter: impl Fn(&Entry, usize) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkOptions")
            .field("max_depth", &self.max_depth)
            .field("include_files", &self.include_files)
            .field("include_directories", &self.include_directories)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// One walk result.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkEntry {
    /// Path relative to the walk root, `/`-separated.
    pub path: String,
    pub entry: Entry,
    pub depth: usize,
}

struct Frame {
    dir: VfsPath,
    /// Depth of this directory's children.
    depth: usize,
    /// Listed lazily, the first time the frame is reached.
    pending: Option<vec::IntoIter<DirEntry>>,
}

/// Lazy pre-order walk.
///
/// Directories are listed only when the walk reaches them, so stopping
/// early skips the rest of the subtree scan. Traversal uses an explicit
/// stack. Sibling order is the adapter's listing order.
pub struct Walk {
    store: Arc<Store>,
    root: VfsPath,
    options: WalkOptions,
    stack: Vec<Frame>,
}

impl Walk {
    pub(super) fn new(store: Arc<Store>, root: VfsPath, options: WalkOptions) -> Self {
        let stack = vec![Frame {
            dir: root.clone(),
            depth: 0,
            pending: None,
        }];
        Self {
            store,
            root,
            options,
            stack,
        }
    }

    /// Next entry, or `None` when the walk is done.
    ///
    /// A listing failure is yielded once and the failing directory is
    /// abandoned; the walk carries on with its siblings.
    pub async fn next(&mut self) -> Option<VfsResult<WalkEntry>> {
        loop {
            let frame = self.stack.last_mut()?;

            if frame.pending.is_none() {
                match self.store.adapter.list(&frame.dir.to_string()).await {
                    Ok(listing) => frame.pending = Some(listing.into_iter()),
                    Err(e) => {
                        self.stack.pop();
                        return Some(Err(e));
                    }
                }
            }

            let Some(child) = frame.pending.as_mut().and_then(Iterator::next) else {
                self.stack.pop();
                continue;
            };
            let depth = frame.depth;
            let path = match frame.dir.join(&child.name) {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };

            let entry = match self.store.probe(path.clone()).await {
                Ok(Some(entry)) => entry,
                // Removed since the listing.
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };

            if let Some(filter) = &self.options.filter
                && !filter(&entry, depth)
            {
                continue;
            }

            let descend = self.options.max_depth.is_none_or(|max| depth < max);
            if entry.is_dir() && descend {
                self.stack.push(Frame {
                    dir: path.clone(),
                    depth: depth + 1,
                    pending: None,
                });
            }

            let wanted = match entry {
                Entry::File(_) => self.options.include_files,
                Entry::Directory(_) => self.options.include_directories,
            };
            if wanted {
                let relative = path.relative_to(&self.root).unwrap_or_default();
                return Some(Ok(WalkEntry {
                    path: relative,
                    entry,
                    depth,
                }));
            }
        }
    }

    /// Adapt into a [`Stream`]. Dropping the stream stops the walk.
    pub fn into_stream(self) -> impl Stream<Item = VfsResult<WalkEntry>> + Send {
        futures::stream::unfold(self, |mut walk| async move {
            let item = walk.next().await?;
            Some((item, walk))
        })
    }
}

impl fmt::Debug for Walk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walk")
            .field("root", &self.root.to_string())
            .field("options", &self.options)
            .field("open_directories", &self.stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::adapters::MemoryAdapter;
    use crate::error::ErrorKind;
    use crate::tree::Directory;
    use crate::types::{RemoveOptions, WriteOptions};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// a/ a/b/ a/b/c/ a/b/c/deep.txt a/one.txt top.txt
    async fn tree() -> Directory {
        let root = Directory::open(Arc::new(MemoryAdapter::ready().await.unwrap()))
            .await
            .unwrap();
        let c = root.create_path(&["a", "b", "c"]).await.unwrap();
        c.create_file("deep.txt").await.unwrap();
        root.resolve_directory("a")
            .await
            .unwrap()
            .create_file("one.txt")
            .await
            .unwrap();
        root.create_file("top.txt").await.unwrap();
        root
    }

    async fn collect(mut walk: Walk) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        while let Some(item) = walk.next().await {
            let item = item.unwrap();
            out.push((item.path, item.depth));
        }
        out
    }

    #[tokio::test]
    async fn test_preorder() {
        let root = tree().await;
        let paths = collect(root.walk(WalkOptions::default())).await;
        let expected = [
            ("a", 0),
            ("a/b", 1),
            ("a/b/c", 2),
            ("a/b/c/deep.txt", 3),
            ("a/one.txt", 1),
            ("top.txt", 0),
        ];
        let expected: Vec<(String, usize)> = expected.iter().map(|(p, d)| (p.to_string(), *d)).collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test]
    async fn test_max_depth_skips_deeper_subtrees() {
        let root = tree().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = WalkOptions::default().max_depth(1).filter(move |_, depth| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(depth <= 1, "visited depth {depth}");
            true
        });

        let paths = collect(root.walk(options)).await;
        assert!(paths.iter().all(|(_, d)| *d <= 1));
        assert_eq!(paths.len(), 4);
        // a, a/b, a/one.txt, top.txt; nothing under a/b is ever considered.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_filter_prunes_directories() {
        let root = tree().await;
        let options = WalkOptions::default().filter(|entry, _| entry.name() != "b");
        let paths = collect(root.walk(options)).await;
        assert!(paths.iter().all(|(p, _)| !p.starts_with("a/b")));
        assert_eq!(paths.len(), 3);
    }

    #[tokio::test]
    async fn test_kind_toggles() {
        let root = tree().await;
        let files = collect(root.walk(WalkOptions::default().files_only())).await;
        assert_eq!(files.len(), 3);
        // Directories are still descended into when not yielded.
        assert!(files.iter().any(|(p, _)| p == "a/b/c/deep.txt"));

        let dirs = collect(root.walk(WalkOptions::default().directories_only())).await;
        assert_eq!(dirs.len(), 3);
    }

    #[tokio::test]
    async fn test_early_stop_and_stream() {
        let root = tree().await;
        let mut walk = root.walk(WalkOptions::default());
        assert!(walk.next().await.unwrap().is_ok());
        drop(walk);

        let stream = root.walk(WalkOptions::default().files_only()).into_stream();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.as_ref().unwrap().entry.is_file()));
    }

    #[tokio::test]
    async fn test_listing_failure_skips_only_that_directory() {
        let root = tree().await;
        root.create_directory("b").await.unwrap();
        let adapter = root.adapter().clone();

        let mut walk = root.walk(WalkOptions::default());
        let first = walk.next().await.unwrap().unwrap();
        assert_eq!(first.path, "a");

        // Swap `a` for a file before the walk lists it.
        adapter.rmdir("/a", RemoveOptions::recursive()).await.unwrap();
        adapter.write("/a", b"now a file", WriteOptions::replace()).await.unwrap();

        let err = walk.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let mut rest = Vec::new();
        while let Some(item) = walk.next().await {
            rest.push(item.unwrap().path);
        }
        assert_eq!(rest, ["b", "top.txt"]);
    }

    #[tokio::test]
    async fn test_walk_subdirectory_paths_are_relative() {
        let root = tree().await;
        let a = root.resolve_directory("a").await.unwrap();
        let paths = collect(a.walk(WalkOptions::default().max_depth(0))).await;
        let mut names: Vec<String> = paths.into_iter().map(|(p, _)| p).collect();
        names.sort();
        assert_eq!(names, ["b", "one.txt"]);
    }
}
