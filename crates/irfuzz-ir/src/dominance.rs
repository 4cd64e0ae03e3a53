//! Dominator analysis over the blocks of a function.

use crate::program::Function;

/// Immediate dominators of every block of a function, indexed by block position.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: Vec<Option<usize>>,
    rpo_number: Vec<Option<usize>>,
}

impl DominatorTree {
    /// Compute dominators with the iterative algorithm of Cooper, Harvey and
    /// Kennedy. Block 0 is the entry. Unknown branch targets are ignored.
    pub fn compute(func: &Function) -> Self {
        let n = func.blocks.len();
        let successors: Vec<Vec<usize>> = func
            .blocks
            .iter()
            .map(|block| {
                block
                    .terminator()
                    .map(|term| {
                        term.targets
                            .iter()
                            .filter_map(|target| func.block_index(*target))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let mut predecessors = vec![Vec::new(); n];
        for (block, succs) in successors.iter().enumerate() {
            for succ in succs {
                predecessors[*succ].push(block);
            }
        }

        let rpo = reverse_post_order(&successors);
        let mut rpo_number = vec![None; n];
        for (number, block) in rpo.iter().enumerate() {
            rpo_number[*block] = Some(number);
        }

        let mut idom: Vec<Option<usize>> = vec![None; n];
        if n > 0 {
            idom[0] = Some(0);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &pred in &predecessors[block] {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_number, pred, current),
                    });
                }
                if new_idom.is_some() && idom[block] != new_idom {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom, rpo_number }
    }

    pub fn is_reachable(&self, block: usize) -> bool {
        self.rpo_number.get(block).copied().flatten().is_some()
    }

    /// Returns true if every path from the entry to `b` goes through `a`.
    /// An unreachable block is only dominated by itself.
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        while let Some(parent) = self.idom[current] {
            if parent == current {
                return false;
            }
            if parent == a {
                return true;
            }
            current = parent;
        }
        false
    }

    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }
}

fn intersect(
    idom: &[Option<usize>],
    rpo_number: &[Option<usize>],
    mut a: usize,
    mut b: usize,
) -> usize {
    while a != b {
        while rpo_number[a] > rpo_number[b] {
            match idom[a] {
                Some(parent) => a = parent,
                None => return b,
            }
        }
        while rpo_number[b] > rpo_number[a] {
            match idom[b] {
                Some(parent) => b = parent,
                None => return a,
            }
        }
    }
    a
}

fn reverse_post_order(successors: &[Vec<usize>]) -> Vec<usize> {
    if successors.is_empty() {
        return Vec::new();
    }
    let mut visited = vec![false; successors.len()];
    let mut post_order = Vec::with_capacity(successors.len());
    let mut stack = vec![(0usize, 0usize)];
    visited[0] = true;

    while let Some((block, next)) = stack.last_mut() {
        if let Some(&succ) = successors[*block].get(*next) {
            *next += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            post_order.push(*block);
            stack.pop();
        }
    }

    post_order.reverse();
    post_order
}
