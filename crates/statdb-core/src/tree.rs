//! The hierarchical stats tree.
//!
//! Nodes are keyed by [`Path`]; each node holds its own container value and
//! a map from child key to child node. Missing nodes are materialized from
//! the schema's per-level defaults.
//!
//! Aggregate recomputation is bottom-up: after a batch of merges, dirty
//! paths (plus all their ancestors) are recomputed deepest-first, so an
//! ancestor never aggregates stale child state.

use crate::container::Container;
use crate::error::{Result, StatsError};
use crate::path::Path;
use crate::schema::NodeSchema;
use std::collections::{BTreeMap, BTreeSet};

/// One tree node: its own value plus direct children keyed by name.
#[derive(Clone, Debug)]
pub struct TreeNode<V> {
    pub value: V,
    children: BTreeMap<String, TreeNode<V>>,
}

impl<V> TreeNode<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            children: BTreeMap::new(),
        }
    }

    /// Direct child values, in key order.
    pub fn child_values(&self) -> impl Iterator<Item = &V> {
        self.children.values().map(|n| &n.value)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// The canonical tree: top-level nodes keyed by their first path key.
#[derive(Clone, Debug)]
pub struct StatsTree<V: Container> {
    schema: NodeSchema<V>,
    roots: BTreeMap<String, TreeNode<V>>,
}

impl<V: Container> StatsTree<V> {
    pub fn new(schema: NodeSchema<V>) -> Self {
        Self {
            schema,
            roots: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &NodeSchema<V> {
        &self.schema
    }

    /// Node at `path`, if it exists.
    pub fn node(&self, path: &Path) -> Option<&TreeNode<V>> {
        let mut keys = path.keys().iter();
        let mut node = self.roots.get(keys.next()?)?;
        for key in keys {
            node = node.children.get(key)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &Path) -> Option<&mut TreeNode<V>> {
        let mut keys = path.keys().iter();
        let mut node = self.roots.get_mut(keys.next()?)?;
        for key in keys {
            node = node.children.get_mut(key)?;
        }
        Some(node)
    }

    /// Current value at `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&V> {
        self.node(path).map(|n| &n.value)
    }

    /// Value at `path`, materializing the node and any missing ancestors
    /// with schema defaults.
    ///
    /// Rejects paths outside the schema depth.
    pub fn get_or_create(&mut self, path: &Path) -> Result<&mut V> {
        self.schema.validate(path)?;
        let Self { schema, roots } = self;
        let mut keys = path.keys().iter().enumerate();
        let (_, first) = keys.next().ok_or(StatsError::InvalidPathDepth {
            len: 0,
            depth: schema.len(),
        })?;
        let fresh = schema.default_for(1)?;
        let mut node = roots
            .entry(first.clone())
            .or_insert_with(|| TreeNode::new(fresh));
        for (i, key) in keys {
            let fresh = schema.default_for(i + 1)?;
            node = node
                .children
                .entry(key.clone())
                .or_insert_with(|| TreeNode::new(fresh));
        }
        Ok(&mut node.value)
    }

    /// Direct child values of the node at `path`; empty if the node does
    /// not exist or has no children.
    pub fn children(&self, path: &Path) -> Vec<&V> {
        self.node(path)
            .map(|n| n.child_values().collect())
            .unwrap_or_default()
    }

    /// Flatten the tree into `(path, value)` rows, parents before children.
    pub fn rows(&self) -> Vec<(Path, &V)> {
        let mut out = Vec::new();
        for (key, node) in &self.roots {
            collect_rows(Path::new([key.clone()]), node, &mut out);
        }
        out
    }

    /// Recompute aggregates for `dirty` paths and all of their ancestors,
    /// deepest first. Returns the full set of recomputed paths, for
    /// persistence of touched rows.
    pub fn recompute(&mut self, dirty: impl IntoIterator<Item = Path>) -> BTreeSet<Path> {
        let mut touched = BTreeSet::new();
        for path in dirty {
            let mut current = Some(path);
            while let Some(p) = current {
                let parent = p.parent();
                touched.insert(p);
                current = parent;
            }
        }

        let mut ordered: Vec<Path> = touched.iter().cloned().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        for path in &ordered {
            aggregate_at(self.node_mut(path));
        }
        touched
    }

    /// Recompute every aggregate in the tree, leaves first.
    ///
    /// Used after rebuilding the tree from storage: derived fields are
    /// never trusted from persisted rows.
    pub fn recompute_all(&mut self) {
        for node in self.roots.values_mut() {
            recompute_subtree(node);
        }
    }
}

fn collect_rows<'a, V>(path: Path, node: &'a TreeNode<V>, out: &mut Vec<(Path, &'a V)>) {
    out.push((path.clone(), &node.value));
    for (key, child) in &node.children {
        collect_rows(path.child(key.clone()), child, out);
    }
}

fn aggregate_at<V: Container>(node: Option<&mut TreeNode<V>>) {
    if let Some(TreeNode { value, children }) = node {
        let kids: Vec<&V> = children.values().map(|n| &n.value).collect();
        value.aggregate(&kids);
    }
}

fn recompute_subtree<V: Container>(node: &mut TreeNode<V>) {
    for child in node.children.values_mut() {
        recompute_subtree(child);
    }
    let TreeNode { value, children } = node;
    let kids: Vec<&V> = children.values().map(|n| &n.value).collect();
    value.aggregate(&kids);
}
