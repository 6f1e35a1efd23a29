//! Deterministic tree shape generation.
//!
//! The root carries seed 0 (or a caller-supplied root seed) and child `i` of a
//! node with seed `s` carries `s * 31 + i`, in wrapping `u64` arithmetic.
//! Nodes at `level >= depth` are leaves. Everything here is a pure function of
//! its inputs.

use crate::models::{LeafKind, PayloadConfig};

/// Multiplier of the per-child seed recurrence.
pub const SEED_MULTIPLIER: u64 = 31;

/// Rows rendered by a virtualized list leaf.
pub const VIRTUAL_WINDOW_ROWS: u32 = 40;

/// One materialized position of the tree, in pre-order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub seed: u64,
    pub level: u32,
    /// Index of the parent record; `None` for the root
    pub parent: Option<usize>,
    /// Position among the parent's children
    pub child_index: u32,
    /// Indices of the child records
    pub children: Vec<usize>,
    /// Leaf variant; `None` for inner nodes or when no variants are configured
    pub variant: Option<LeafKind>,
}

impl NodeRecord {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Seed of child `index` under a parent seed.
pub fn child_seed(parent_seed: u64, index: u32) -> u64 {
    parent_seed
        .wrapping_mul(SEED_MULTIPLIER)
        .wrapping_add(index as u64)
}

/// Leaf variant for a seed at a level: `(seed + level) mod |types|`.
pub fn leaf_variant(seed: u64, level: u32, types: &[LeafKind]) -> Option<LeafKind> {
    if types.is_empty() {
        return None;
    }
    let idx = seed.wrapping_add(level as u64) % types.len() as u64;
    types.get(idx as usize).copied()
}

/// Number of nodes a `(depth, breadth)` tree materializes, saturating.
pub fn node_count(depth: u32, breadth: u32) -> u64 {
    let mut total: u64 = 1;
    let mut level_width: u64 = 1;
    for _ in 0..depth {
        level_width = level_width.saturating_mul(breadth as u64);
        total = total.saturating_add(level_width);
        if level_width == 0 {
            break;
        }
    }
    total
}

/// Materialize a tree rooted at seed 0.
pub fn generate(depth: u32, breadth: u32, types: &[LeafKind]) -> Vec<NodeRecord> {
    generate_from_root(0, depth, breadth, types)
}

/// Materialize a tree whose root carries `root_seed`, in pre-order.
pub fn generate_from_root(
    root_seed: u64,
    depth: u32,
    breadth: u32,
    types: &[LeafKind],
) -> Vec<NodeRecord> {
    let capacity = node_count(depth, breadth).min(1 << 20) as usize;
    let mut nodes = Vec::with_capacity(capacity);

    // Explicit stack keeps deep trees off the call stack. Children are pushed
    // in reverse so they pop in order.
    let mut stack: Vec<(u64, u32, Option<usize>, u32)> = vec![(root_seed, 0, None, 0)];
    while let Some((seed, level, parent, child_index)) = stack.pop() {
        let idx = nodes.len();
        let leaf = level >= depth || breadth == 0;
        nodes.push(NodeRecord {
            seed,
            level,
            parent,
            child_index,
            children: Vec::new(),
            variant: if leaf {
                leaf_variant(seed, level, types)
            } else {
                None
            },
        });

        if let Some(p) = parent {
            nodes[p].children.push(idx);
        }

        if !leaf {
            for i in (0..breadth).rev() {
                stack.push((child_seed(seed, i), level + 1, Some(idx), i));
            }
        }
    }

    nodes
}

/// Visible row range `[start, end)` of a list leaf.
pub fn list_window(seed: u64, payload: &PayloadConfig) -> (u32, u32) {
    let rows = payload.list_rows;
    if !payload.virtualization {
        return (0, rows);
    }
    let span = rows.saturating_sub(VIRTUAL_WINDOW_ROWS);
    let offset = (seed % span.max(1) as u64) as u32;
    let start = offset.min(span);
    let end = rows.min(start + VIRTUAL_WINDOW_ROWS);
    (start, end)
}

/// Simulated element count rendered by a leaf of the given variant.
pub fn leaf_payload(kind: LeafKind, seed: u64, payload: &PayloadConfig) -> u32 {
    match kind {
        LeafKind::Text => payload.dom_nodes_per_leaf,
        LeafKind::Layout => payload.dom_nodes_per_leaf.max(1),
        LeafKind::List => {
            let (start, end) = list_window(seed, payload);
            end - start
        }
    }
}
