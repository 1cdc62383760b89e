//! Tree addressing.
//!
//! A [`Path`] is an ordered, non-empty sequence of string keys, anchored at
//! the root. Paths are the only addressing mechanism in the tree and are
//! compared structurally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered sequence of keys addressing one node in the tree.
///
/// The length of a path is bounded by the schema depth; a shorter path
/// addresses an interior node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(keys.into_iter().map(Into::into).collect())
    }

    /// Number of keys (the depth this path addresses).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// Last key of the path, `None` for the empty path.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path addressing the direct parent, `None` at depth 1 (the parent is
    /// the anonymous root).
    pub fn parent(&self) -> Option<Path> {
        if self.0.len() > 1 {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// Extend this path with one more key.
    pub fn child(&self, key: impl Into<String>) -> Path {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Path(keys)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<Vec<String>> for Path {
    fn from(keys: Vec<String>) -> Self {
        Path(keys)
    }
}

impl From<&[&str]> for Path {
    fn from(keys: &[&str]) -> Self {
        Path::new(keys.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(keys: [&str; N]) -> Self {
        Path::new(keys)
    }
}
