//! Absolute, validated VFS paths.
//!
//! A [`VfsPath`] is a sequence of non-empty segments. The root is the
//! empty sequence and displays as `/`; every other path displays as
//! `/a/b` with no trailing separator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{VfsError, VfsResult};

/// Path separator.
pub const SEPARATOR: char = '/';

/// A parsed absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VfsPath {
    segments: Vec<String>,
}

impl VfsPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a separator-delimited path.
    ///
    /// Leading, trailing and repeated separators are ignored, so `a/b`,
    /// `/a/b` and `/a//b/` are the same path. `.` and `..` are rejected
    /// rather than resolved.
    pub fn parse(path: &str) -> VfsResult<Self> {
        let mut segments = Vec::new();
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
            validate_name(segment).map_err(|e| e.with_path(path))?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from already-separated segments.
    pub fn from_segments<I, S>(segments: I) -> VfsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.join(segment.as_ref())?;
        }
        Ok(path)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (root is 0).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, or `""` for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a single validated name.
    pub fn join(&self, name: &str) -> VfsResult<Self> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Segment-aware prefix test: `/keep` is a prefix of `/keep/a` but not of `/keeper`.
    pub fn starts_with(&self, prefix: &VfsPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Path relative to `base`, joined with `/`, or `None` if `base` is not a prefix.
    pub fn relative_to(&self, base: &VfsPath) -> Option<String> {
        if !self.starts_with(base) {
            return None;
        }
        Some(self.segments[base.segments.len()..].join("/"))
    }

    /// Re-root this path from `from` onto `to`.
    pub fn rebase(&self, from: &VfsPath, to: &VfsPath) -> Option<Self> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(Self { segments })
    }

    /// Every proper ancestor, shortest first, excluding the root.
    pub fn ancestors(&self) -> impl Iterator<Item = VfsPath> + '_ {
        (1..self.segments.len()).map(|n| Self {
            segments: self.segments[..n].to_vec(),
        })
    }
}

/// Check a single entry name.
pub fn validate_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(SEPARATOR) || name.contains('\0') {
        return Err(VfsError::invalid_name(name));
    }
    Ok(())
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for VfsPath {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VfsPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VfsPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_and_display() {
        let path = VfsPath::parse("/a/b/c.txt").unwrap();
        assert_eq!(path.segments(), ["a", "b", "c.txt"]);
        assert_eq!(path.to_string(), "/a/b/c.txt");
        assert_eq!(path.name(), "c.txt");

        assert_eq!(VfsPath::parse("a//b/").unwrap().to_string(), "/a/b");
        assert!(VfsPath::parse("/").unwrap().is_root());
        assert_eq!(VfsPath::root().to_string(), "/");
    }

    #[test]
    fn test_traversal_rejected() {
        let err = VfsPath::parse("/a/../etc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(VfsPath::parse("./a").is_err());
        assert!(VfsPath::root().join("a/b").is_err());
        assert!(VfsPath::root().join("").is_err());
    }

    #[test]
    fn test_starts_with_is_segment_aware() {
        let keep = VfsPath::parse("/keep").unwrap();
        assert!(VfsPath::parse("/keep/file.txt").unwrap().starts_with(&keep));
        assert!(VfsPath::parse("/keep").unwrap().starts_with(&keep));
        assert!(!VfsPath::parse("/keeper").unwrap().starts_with(&keep));
        assert!(keep.starts_with(&VfsPath::root()));
    }

    #[test]
    fn test_parent_and_ancestors() {
        let path = VfsPath::parse("/a/b/c").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "/a/b");
        assert!(VfsPath::root().parent().is_none());

        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, ["/a", "/a/b"]);
    }

    #[test]
    fn test_rebase() {
        let path = VfsPath::parse("/src/x/y.txt").unwrap();
        let from = VfsPath::parse("/src").unwrap();
        let to = VfsPath::parse("/dst/copy").unwrap();
        assert_eq!(path.rebase(&from, &to).unwrap().to_string(), "/dst/copy/x/y.txt");
        assert_eq!(path.relative_to(&from).unwrap(), "x/y.txt");
    }
}
