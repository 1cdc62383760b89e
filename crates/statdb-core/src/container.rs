//! The merge/aggregate contract - the value model of the stats tree.
//!
//! Every value stored at a tree node implements [`Container`]:
//!
//! - `merge` accumulates another delta of the same type. For counters it
//!   must be associative and commutative, so repeated deltas converge to
//!   the same total regardless of batching.
//! - `aggregate` recomputes derived fields from the current values of the
//!   direct children. It is a pure function of the children slice, not a
//!   merge of deltas, and is invoked after any structural change beneath
//!   the node.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Value type stored at a tree node.
///
/// A schema binds one concrete container type per tree level. Heterogeneous
/// levels are modeled as a tagged variant: the per-level factory yields the
/// right variant, so no runtime type inspection is needed.
pub trait Container:
    Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Accumulate another delta into `self`.
    ///
    /// Represents repeated deltas arriving at the same path; must be
    /// associative and commutative for counter-like fields.
    fn merge(&mut self, other: &Self);

    /// Recompute derived fields from the current values of all direct
    /// children.
    ///
    /// Called with already-merged children, deepest subtrees first, so the
    /// slice is never stale. Must be well-defined for an empty slice - a
    /// node may exist with no children yet.
    fn aggregate(&mut self, children: &[&Self]);
}
