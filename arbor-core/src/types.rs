/// Identifier for a branch in a [`crate::tree::BranchTree`].
///
/// This is an index into `BranchTree::branches`, and is only meaningful
/// within the lifetime of a given `BranchTree` instance.
pub type BranchId = usize;

/// Identifier for a stage in a [`crate::graph::StageGraph`].
///
/// This is an index into the graph's stage list, assigned when the stage
/// is added and stable for the lifetime of the graph.
pub type StageId = usize;
