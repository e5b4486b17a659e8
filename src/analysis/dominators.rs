//! Dominator tree.
//!
//! Immediate dominators are computed with the iterative algorithm of Cooper,
//! Harvey and Kennedy: blocks are processed in reverse post-order and each
//! block's dominator is the intersection of its processed predecessors'
//! dominators, repeated until nothing changes.

use super::cfg::ControlFlowGraph;
use crate::ir::BlockId;

const UNDEF: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// Immediate dominator per block; the entry maps to itself.
    idom: Vec<Option<BlockId>>,
    /// Position of each block in reverse post-order, `UNDEF` if unreachable.
    rpo_index: Vec<usize>,
    rpo: Vec<BlockId>,
}

impl DominatorTree {
    pub fn new(cfg: &ControlFlowGraph) -> Self {
        let rpo = cfg.reverse_post_order();
        let mut rpo_index = vec![UNDEF; cfg.num_blocks()];
        for (idx, block) in rpo.iter().enumerate() {
            rpo_index[block.index()] = idx;
        }

        // Dominators are tracked by RPO position while iterating.
        let mut doms = vec![UNDEF; rpo.len()];
        if !rpo.is_empty() {
            doms[0] = 0;
        }

        let mut changed = true;
        let mut rounds = 0;
        while changed {
            changed = false;
            rounds += 1;
            for (idx, &block) in rpo.iter().enumerate().skip(1) {
                let mut new_idom = UNDEF;
                for pred in cfg.preds(block) {
                    let p = rpo_index[pred.index()];
                    if p == UNDEF || doms[p] == UNDEF {
                        continue;
                    }
                    new_idom = if new_idom == UNDEF {
                        p
                    } else {
                        intersect(&doms, p, new_idom)
                    };
                }
                if doms[idx] != new_idom {
                    doms[idx] = new_idom;
                    changed = true;
                }
            }
        }
        log::trace!("dominators converged after {rounds} round(s) over {} block(s)", rpo.len());

        let mut idom = vec![None; cfg.num_blocks()];
        for (idx, &block) in rpo.iter().enumerate() {
            if doms[idx] != UNDEF {
                idom[block.index()] = Some(rpo[doms[idx]]);
            }
        }

        Self {
            idom,
            rpo_index,
            rpo,
        }
    }

    /// Blocks reachable from the entry, in reverse post-order.
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_index
            .get(block.index())
            .is_some_and(|&idx| idx != UNDEF)
    }

    /// Immediate dominator of `block`. `None` for the entry block and for
    /// unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom
            .get(block.index())
            .copied()
            .flatten()
            .filter(|&dom| dom != block)
    }

    /// Whether `a` dominates `b`. Every reachable block dominates itself;
    /// nothing dominates an unreachable block.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        if a == b {
            return true;
        }

        let mut current = b;
        while let Some(idom) = self.idom(current) {
            if idom == a {
                return true;
            }
            current = idom;
        }
        false
    }
}

fn intersect(doms: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = doms[a];
        }
        while b > a {
            b = doms[b];
        }
    }
    a
}
