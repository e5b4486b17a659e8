//! Successor and predecessor lists, and reverse post-order.

use hashbrown::HashSet;

use crate::ir::{BlockId, Function};

/// Control-flow graph of one function.
///
/// Edges come from each block's terminator. A block without a terminator
/// has no successors, and branch targets that do not exist are dropped.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    entry: Option<BlockId>,
    succs: Vec<Vec<BlockId>>,
    preds: Vec<Vec<BlockId>>,
}

impl ControlFlowGraph {
    pub fn new(func: &Function) -> Self {
        let num_blocks = func.num_blocks();
        let mut succs = vec![Vec::new(); num_blocks];
        let mut preds = vec![Vec::new(); num_blocks];

        for (block, _) in func.blocks() {
            for succ in func.successors(block) {
                if succ.index() >= num_blocks {
                    continue;
                }
                // A conditional branch with equal targets is a single edge.
                if !succs[block.index()].contains(&succ) {
                    succs[block.index()].push(succ);
                    preds[succ.index()].push(block);
                }
            }
        }

        let entry = func.entry_block().filter(|b| b.index() < num_blocks);
        Self {
            entry,
            succs,
            preds,
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    pub fn num_blocks(&self) -> usize {
        self.succs.len()
    }

    pub fn succs(&self, block: BlockId) -> &[BlockId] {
        self.succs.get(block.index()).map_or(&[], Vec::as_slice)
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        self.preds.get(block.index()).map_or(&[], Vec::as_slice)
    }

    /// Blocks reachable from the entry, in reverse post-order.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };

        let mut post = Vec::with_capacity(self.num_blocks());
        let mut stack = vec![(entry, false)];
        let mut visited = HashSet::new();
        while let Some((block, processed)) = stack.pop() {
            if processed {
                post.push(block);
                continue;
            }
            if !visited.insert(block) {
                continue;
            }
            stack.push((block, true));
            for &succ in self.succs(block) {
                if !visited.contains(&succ) {
                    stack.push((succ, false));
                }
            }
        }
        post.reverse();
        post
    }
}
