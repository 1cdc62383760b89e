//! Tree schema - the fixed set of levels and their default-value factories.
//!
//! A schema declares, once per tree instance, how deep the tree is and what
//! an empty container looks like at each depth. The container type at a path
//! is determined solely by the path's depth.

use crate::container::Container;
use crate::error::{Result, StatsError};
use crate::path::Path;
use std::fmt;
use std::sync::Arc;

type Factory<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// One level descriptor: a name and a zero-argument factory producing a
/// fresh, empty container for that level.
#[derive(Clone)]
pub struct NodeLevel<V> {
    name: String,
    factory: Factory<V>,
}

impl<V: Container> NodeLevel<V> {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a fresh default container for this level.
    pub fn new_instance(&self) -> V {
        (self.factory)()
    }
}

impl<V> fmt::Debug for NodeLevel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLevel").field("name", &self.name).finish()
    }
}

/// Ordered list of level descriptors with a fixed depth.
///
/// Update/get calls must supply a path whose length falls within
/// `1..=len()`; a mismatched length is a usage error, never retried.
#[derive(Clone, Debug)]
pub struct NodeSchema<V> {
    levels: Vec<NodeLevel<V>>,
}

impl<V: Container> NodeSchema<V> {
    pub fn new(levels: Vec<NodeLevel<V>>) -> Result<Self> {
        if levels.is_empty() {
            return Err(StatsError::EmptySchema);
        }
        Ok(Self { levels })
    }

    /// Number of levels (the fixed tree depth).
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level descriptor at 1-based `depth`.
    pub fn level(&self, depth: usize) -> Option<&NodeLevel<V>> {
        self.levels.get(depth.wrapping_sub(1))
    }

    /// Fresh default container for 1-based `depth`.
    pub fn default_for(&self, depth: usize) -> Result<V> {
        self.level(depth)
            .map(NodeLevel::new_instance)
            .ok_or(StatsError::InvalidPathDepth {
                len: depth,
                depth: self.levels.len(),
            })
    }

    /// Check a path's length against the schema depth.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let len = path.len();
        if len == 0 || len > self.levels.len() {
            return Err(StatsError::InvalidPathDepth {
                len,
                depth: self.levels.len(),
            });
        }
        Ok(())
    }
}
