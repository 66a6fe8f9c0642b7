use std::{
    collections::{hash_map::Entry, HashMap},
    error::Error,
    fmt,
};

use crate::{
    minimum_unchecked,
    nodes::visitor::{Visitable, Visitor},
    ArtIndex, InnerNode, InnerNode16, InnerNode256, InnerNode4, InnerNode48, KeySource, NodeType,
    OpaqueNodePtr, RestrictedNodeIndex,
};

/// A portion of an entire key that should uniquely identify a node position
/// in the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct KeyPrefix(Box<[u8]>);

impl From<&[u8]> for KeyPrefix {
    fn from(src: &[u8]) -> Self {
        KeyPrefix(Box::from(src))
    }
}

impl<const LEN: usize> PartialEq<[u8; LEN]> for KeyPrefix {
    fn eq(&self, other: &[u8; LEN]) -> bool {
        self.0.as_ref() == other.as_slice()
    }
}

/// An issue with the well-formed-ness of the tree. See the documentation on
/// [`WellFormedChecker`] for more context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedTreeError {
    /// A loop was observed between nodes.
    LoopFound {
        /// The node that was observed more than once while traversing.
        node_ptr: OpaqueNodePtr,
        /// The key prefix when the node was first observed.
        first_observed: KeyPrefix,
        /// The key prefix when the node was observed a second time.
        later_observed: KeyPrefix,
    },
    /// An inner node had a child count outside the legal range for its
    /// representation.
    WrongChildrenCount {
        /// The key prefix identifying the inner node.
        key_prefix: KeyPrefix,
        /// The type of the inner node.
        node_type: NodeType,
        /// The number of children found at the inner node.
        num_children: usize,
    },
    /// An inner node's header count disagrees with the number of populated
    /// entries in its child map.
    MiscountedChildren {
        /// The key prefix identifying the inner node.
        key_prefix: KeyPrefix,
        /// The type of the inner node.
        node_type: NodeType,
        /// The count recorded in the node header.
        header_count: usize,
        /// The number of children actually present in the child map.
        map_count: usize,
    },
    /// The key fragments of an inner node's children were not strictly
    /// ascending in iteration order.
    UnsortedKeyFragments {
        /// The key prefix identifying the inner node.
        key_prefix: KeyPrefix,
        /// The type of the inner node.
        node_type: NodeType,
    },
    /// A node 48 index entry referred to an empty child slot.
    DanglingChildIndex {
        /// The key prefix identifying the inner node.
        key_prefix: KeyPrefix,
        /// The key fragment whose index entry is dangling.
        key_fragment: u8,
    },
    /// An inner node's stored prefix disagrees with the key bytes of the
    /// minimum leaf below it.
    PrefixMismatch {
        /// The key prefix identifying the inner node.
        key_prefix: KeyPrefix,
        /// The prefix bytes stored in the node header.
        stored: Box<[u8]>,
        /// The bytes reconstructed from the minimum leaf at the same
        /// position.
        reconstructed: Box<[u8]>,
    },
    /// A leaf's reconstructed key did not start with the key bytes spelled
    /// out by the path leading to it.
    LeafKeyMismatch {
        /// The key bytes spelled out by the path to the leaf.
        expected_prefix: KeyPrefix,
        /// The key reconstructed for the leaf value.
        leaf_key: Box<[u8]>,
        /// The leaf value.
        value: usize,
    },
    /// The tree reports a non-zero length even though the root is `None`.
    EmptyTreeWithLen,
}

impl fmt::Display for MalformedTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedTreeError::LoopFound {
                node_ptr,
                first_observed,
                later_observed,
            } => {
                write!(
                    f,
                    "Found a loop in the tree containing the node [{node_ptr:?}]. First observed \
                     that node at [{first_observed:?}], then later observed the same node at \
                     [{later_observed:?}]",
                )
            },
            MalformedTreeError::WrongChildrenCount {
                key_prefix,
                node_type,
                num_children,
            } => {
                write!(
                    f,
                    "Found an inner node of type [{node_type:?}] at location [{key_prefix:?}] \
                     with a child count outside the expected range [{:?}]: [{num_children}]",
                    node_type.capacity_range(),
                )
            },
            MalformedTreeError::MiscountedChildren {
                key_prefix,
                node_type,
                header_count,
                map_count,
            } => {
                write!(
                    f,
                    "Found an inner node of type [{node_type:?}] at location [{key_prefix:?}] \
                     whose header counts [{header_count}] children while its child map holds \
                     [{map_count}]",
                )
            },
            MalformedTreeError::UnsortedKeyFragments {
                key_prefix,
                node_type,
            } => {
                write!(
                    f,
                    "Found an inner node of type [{node_type:?}] at location [{key_prefix:?}] \
                     whose child key fragments were not strictly ascending",
                )
            },
            MalformedTreeError::DanglingChildIndex {
                key_prefix,
                key_fragment,
            } => {
                write!(
                    f,
                    "Found a node 48 at location [{key_prefix:?}] whose index entry for key \
                     fragment [{key_fragment}] points at an empty child slot",
                )
            },
            MalformedTreeError::PrefixMismatch {
                key_prefix,
                stored,
                reconstructed,
            } => {
                write!(
                    f,
                    "Found an inner node at location [{key_prefix:?}] whose stored prefix \
                     [{stored:?}] disagrees with the minimum leaf bytes [{reconstructed:?}]",
                )
            },
            MalformedTreeError::LeafKeyMismatch {
                expected_prefix,
                leaf_key,
                value,
            } => {
                write!(
                    f,
                    "Found a leaf [{value}] whose key [{leaf_key:?}] does not start with the \
                     path bytes [{expected_prefix:?}]",
                )
            },
            MalformedTreeError::EmptyTreeWithLen => {
                write!(f, "The length of the tree is not 0, even though the root is None")
            },
        }
    }
}

impl Error for MalformedTreeError {}

/// A visitor of the radix tree which checks that the tree is well-formed.
///
/// In this context, well-formed means that in the tree:
///  1. there are no loops between nodes
///  2. every inner node's header count equals the number of populated entries
///     in its child map, and that count is legal for the node type under the
///     grow/shrink hysteresis (for example, a node 16 holds 4 to 16 children)
///  3. child key fragments iterate in strictly ascending order, which for the
///     node 4 and node 16 layouts also verifies their sorted storage
///  4. no node 48 index entry points at an empty child slot
///  5. every stored prefix equals the corresponding bytes of the minimum
///     leaf's key below the node, and every leaf key starts with the bytes
///     spelled out by its path
///
/// The checker only reports a single issue at a time. A tree is well-formed
/// by the definition given above only if the check returns `Ok(_)` with the
/// total number of nodes visited.
#[derive(Debug)]
pub struct WellFormedChecker<'a, S: KeySource> {
    current_key_prefix: Vec<u8>,
    seen_nodes: HashMap<OpaqueNodePtr, KeyPrefix>,
    source: &'a S,
}

impl<'a, S: KeySource> WellFormedChecker<'a, S> {
    /// Traverse the given index and check that its tree is well-formed.
    /// Returns the number of nodes in the tree, leaves included.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree is not well-formed.
    pub fn check(tree: &'a ArtIndex<S>) -> Result<usize, MalformedTreeError> {
        match tree.root {
            // SAFETY: The shared borrow on the index excludes concurrent
            // mutation for the duration of the traversal.
            Some(root) => unsafe { Self::check_tree(root, tree.key_source()) },
            None => {
                if tree.is_empty() {
                    Ok(0)
                } else {
                    Err(MalformedTreeError::EmptyTreeWithLen)
                }
            },
        }
    }

    /// Traverse the tree under `root` and check that it is well-formed.
    /// Returns the number of nodes in the tree, leaves included.
    ///
    /// # Safety
    ///
    ///  - For the duration of this function, the given node and all of its
    ///    children must not get mutated.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree is not well-formed.
    pub unsafe fn check_tree(
        root: OpaqueNodePtr,
        source: &'a S,
    ) -> Result<usize, MalformedTreeError> {
        let mut visitor = WellFormedChecker {
            current_key_prefix: Vec::new(),
            seen_nodes: HashMap::new(),
            source,
        };

        // The root is observed at the empty prefix.
        visitor.seen_nodes.insert(root, KeyPrefix::default());

        root.visit_with(&mut visitor)
    }

    fn visit_inner_node<N>(&mut self, inner_node: &N) -> Result<usize, MalformedTreeError>
    where
        N: InnerNode,
    {
        let depth = self.current_key_prefix.len();
        let header = inner_node.header();
        let prefix_len = header.prefix_len();

        // Reconstruct the full compressed path from the minimum leaf and
        // compare the stored portion against it.
        let (_, min_child) = inner_node.min();
        // SAFETY: No mutation is running concurrently, per the requirements
        // on `check_tree`.
        let min_value = unsafe { minimum_unchecked(min_child) };
        let min_key = self.source.load_key(min_value);
        let min_key = min_key.as_ref();

        let stored = header.read_prefix();
        let reconstructed = min_key
            .get(depth..(depth + prefix_len).min(min_key.len()))
            .unwrap_or_default();
        if reconstructed.len() < prefix_len || &reconstructed[..stored.len()] != stored {
            return Err(MalformedTreeError::PrefixMismatch {
                key_prefix: self.current_key_prefix.as_slice().into(),
                stored: stored.into(),
                reconstructed: reconstructed.into(),
            });
        }

        // Track the logical prefix, not just the stored portion, so that
        // leaf checks below nodes with long prefixes see the full path.
        self.current_key_prefix.extend_from_slice(reconstructed);

        let mut running_node_count = 0;
        let mut num_children = 0;
        let mut previous_fragment = None;
        for (key_fragment, child_pointer) in inner_node.iter() {
            if previous_fragment.is_some_and(|previous| previous >= key_fragment) {
                self.current_key_prefix.truncate(depth);
                return Err(MalformedTreeError::UnsortedKeyFragments {
                    key_prefix: self.current_key_prefix.as_slice().into(),
                    node_type: N::TYPE,
                });
            }
            previous_fragment = Some(key_fragment);

            self.current_key_prefix.push(key_fragment);

            let current_key_prefix: KeyPrefix = self.current_key_prefix.as_slice().into();
            match self.seen_nodes.entry(child_pointer) {
                Entry::Occupied(entry) => {
                    return Err(MalformedTreeError::LoopFound {
                        node_ptr: child_pointer,
                        first_observed: entry.get().clone(),
                        later_observed: current_key_prefix,
                    });
                },
                Entry::Vacant(entry) => {
                    entry.insert(current_key_prefix);
                },
            }

            running_node_count += child_pointer.visit_with(self)?;

            assert_eq!(
                self.current_key_prefix.pop(),
                Some(key_fragment),
                "traversal must restore the key prefix it extended"
            );

            num_children += 1;
        }

        self.current_key_prefix.truncate(depth);

        if num_children != header.num_children() {
            return Err(MalformedTreeError::MiscountedChildren {
                key_prefix: self.current_key_prefix.as_slice().into(),
                node_type: N::TYPE,
                header_count: header.num_children(),
                map_count: num_children,
            });
        }

        if !N::TYPE.capacity_range().contains(&num_children) {
            return Err(MalformedTreeError::WrongChildrenCount {
                key_prefix: self.current_key_prefix.as_slice().into(),
                node_type: N::TYPE,
                num_children,
            });
        }

        Ok(running_node_count + 1)
    }
}

impl<'a, S: KeySource> Visitor for WellFormedChecker<'a, S> {
    type Output = Result<usize, MalformedTreeError>;

    fn default_output(&self) -> Self::Output {
        // Zero so that any place that falls back to the default does not
        // influence the overall count.
        Ok(0)
    }

    fn combine_output(&self, o1: Self::Output, o2: Self::Output) -> Self::Output {
        Ok(o1? + o2?)
    }

    fn visit_node4(&mut self, t: &InnerNode4) -> Self::Output {
        self.visit_inner_node(t)
    }

    fn visit_node16(&mut self, t: &InnerNode16) -> Self::Output {
        self.visit_inner_node(t)
    }

    fn visit_node48(&mut self, t: &InnerNode48) -> Self::Output {
        for (key_fragment, index) in t.child_indices.iter().enumerate() {
            if *index != RestrictedNodeIndex::EMPTY
                && t.child_pointers[usize::from(u8::from(*index))].is_none()
            {
                return Err(MalformedTreeError::DanglingChildIndex {
                    key_prefix: self.current_key_prefix.as_slice().into(),
                    // PANIC SAFETY: `child_indices` has length 256, so the
                    // enumerated position always fits in a byte.
                    key_fragment: u8::try_from(key_fragment).unwrap(),
                });
            }
        }

        self.visit_inner_node(t)
    }

    fn visit_node256(&mut self, t: &InnerNode256) -> Self::Output {
        self.visit_inner_node(t)
    }

    fn visit_leaf(&mut self, value: usize) -> Self::Output {
        let leaf_key = self.source.load_key(value);
        let leaf_key = leaf_key.as_ref();

        if !leaf_key.starts_with(&self.current_key_prefix) {
            return Err(MalformedTreeError::LeafKeyMismatch {
                expected_prefix: self.current_key_prefix.as_slice().into(),
                leaf_key: leaf_key.into(),
                value,
            });
        }

        Ok(1)
    }
}
