// This module groups the control-flow analyses that the verifier relies on. The control-flow
// graph records successor and predecessor lists for every block, derived from block
// terminators; targets that name no block are left out of the graph and reported by the
// verifier instead. The block order is a reverse post-order from the entry block computed
// with an explicit stack, and the dominator tree is computed over that order with the
// iterative intersection algorithm. Blocks the entry cannot reach have no dominator.

//! Control-flow analyses over a single function.

pub mod cfg;
pub mod dominators;

pub use cfg::ControlFlowGraph;
pub use dominators::DominatorTree;
