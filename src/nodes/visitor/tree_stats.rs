use std::{fmt, mem};

use crate::{
    nodes::visitor::{Visitable, Visitor},
    ArtIndex, InnerNode, InnerNode16, InnerNode256, InnerNode4, InnerNode48, KeySource, NodeType,
    OpaqueNodePtr,
};

/// Collection of stats about the nodes present in a tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// The number of inner nodes with the 4-child representation.
    pub node4_count: usize,
    /// The number of inner nodes with the 16-child representation.
    pub node16_count: usize,
    /// The number of inner nodes with the 48-child representation.
    pub node48_count: usize,
    /// The number of inner nodes with the 256-child representation.
    pub node256_count: usize,
    /// The number of leaves.
    pub leaf_count: usize,
    /// The sum of child counts over all inner nodes.
    pub total_children: usize,
    /// The sum of child capacities over all inner nodes.
    pub total_capacity: usize,
    /// The total number of bytes allocated for inner nodes.
    pub inner_node_bytes: usize,
}

impl TreeStats {
    /// The total number of inner nodes in the tree.
    pub fn num_inner_nodes(&self) -> usize {
        self.node4_count + self.node16_count + self.node48_count + self.node256_count
    }

    /// The ratio of occupied child slots over all inner nodes.
    pub fn density(&self) -> f64 {
        if self.total_capacity == 0 {
            0.0
        } else {
            self.total_children as f64 / self.total_capacity as f64
        }
    }

    fn record<N: InnerNode>(&mut self, node: &N) {
        let count = match N::TYPE {
            NodeType::Node4 => &mut self.node4_count,
            NodeType::Node16 => &mut self.node16_count,
            NodeType::Node48 => &mut self.node48_count,
            NodeType::Node256 => &mut self.node256_count,
        };
        *count += 1;
        self.total_children += node.header().num_children();
        self.total_capacity += N::TYPE.upper_capacity();
        self.inner_node_bytes += mem::size_of::<N>();
    }
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "leaves: {}, node4: {}, node16: {}, node48: {}, node256: {}, density: {:.3}, inner \
             node bytes: {}",
            self.leaf_count,
            self.node4_count,
            self.node16_count,
            self.node48_count,
            self.node256_count,
            self.density(),
            self.inner_node_bytes,
        )
    }
}

/// A visitor of the radix tree which collects statistics about the tree, like
/// how many inner nodes of each type and how many leaves are present.
#[derive(Debug, Default)]
pub struct TreeStatsCollector {
    stats: TreeStats,
}

impl TreeStatsCollector {
    /// Run the tree stats collection on the given index, then return the
    /// accumulated stats.
    pub fn collect<S: KeySource>(tree: &ArtIndex<S>) -> TreeStats {
        match tree.root {
            // SAFETY: The shared borrow on the index excludes concurrent
            // mutation for the duration of the traversal.
            Some(root) => unsafe { Self::collect_tree(root) },
            None => TreeStats::default(),
        }
    }

    /// Run the tree stats collection on the tree under `root`, then return
    /// the accumulated stats.
    ///
    /// # Safety
    ///
    ///  - For the duration of this function, the given node and all of its
    ///    children must not get mutated.
    pub unsafe fn collect_tree(root: OpaqueNodePtr) -> TreeStats {
        let mut collector = TreeStatsCollector::default();

        root.visit_with(&mut collector);

        collector.stats
    }
}

impl Visitor for TreeStatsCollector {
    type Output = ();

    fn default_output(&self) -> Self::Output {}

    fn combine_output(&self, _: Self::Output, _: Self::Output) -> Self::Output {}

    fn visit_node4(&mut self, t: &InnerNode4) -> Self::Output {
        self.stats.record(t);
        t.super_visit_with(self)
    }

    fn visit_node16(&mut self, t: &InnerNode16) -> Self::Output {
        self.stats.record(t);
        t.super_visit_with(self)
    }

    fn visit_node48(&mut self, t: &InnerNode48) -> Self::Output {
        self.stats.record(t);
        t.super_visit_with(self)
    }

    fn visit_node256(&mut self, t: &InnerNode256) -> Self::Output {
        self.stats.record(t);
        t.super_visit_with(self)
    }

    fn visit_leaf(&mut self, _value: usize) -> Self::Output {
        self.stats.leaf_count += 1;
    }
}
