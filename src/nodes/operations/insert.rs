use std::{error::Error, fmt, ops::ControlFlow};

use crate::{
    minimum_unchecked, nodes::operations::lookup::match_full_prefix, ConcreteNodePtr, Header,
    InnerNode, InnerNode4, KeySource, NodePtr, NodeType, OpaqueNodePtr, NUM_PREFIX_BYTES,
};

/// Insert the given key-value pair into the tree.
///
/// Returns either the result of the insert or an error.
///
/// If the given key already exists in the tree, the value is replaced and the
/// old value is returned in the result.
///
/// # Errors
///
///  - Returns an [`InsertPrefixError`] if the given key is a prefix of a key
///    that exists in the tree, or if an existing key is a prefix of the given
///    key. Neither case can occur for fixed-width keys.
///
/// # Safety
///
///  - The `root` [`OpaqueNodePtr`] must be a unique pointer to the underlying
///    tree.
///  - This function cannot be called concurrently with any reads or writes of
///    `root` or any child node of `root`. This function will arbitrarily read
///    or write to any child in the given tree.
pub unsafe fn insert_unchecked<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    value: usize,
    source: &S,
) -> Result<InsertResult, InsertPrefixError> {
    // SAFETY: Requirements covered by the containing function.
    let InsertPoint {
        parent_ptr_and_child_key_byte,
        insert_kind,
        key_bytes_used,
    } = unsafe { search_for_insert_point(root, key, source)? };

    let new_inner_node = match insert_kind {
        InsertKind::MismatchPrefix {
            matched_bytes,
            mismatched_inner_node_ptr,
        } => {
            // SAFETY: The reference is dropped at the end of this expression
            // and the node is not otherwise accessed in the meantime.
            //
            // PANIC SAFETY: `MismatchPrefix` is only produced for nodes with
            // a header, never for leaves.
            let header_snapshot = *unsafe { mismatched_inner_node_ptr.header_ref() }
                .expect("MismatchPrefix implies an inner node");

            if key_bytes_used + matched_bytes >= key.len() {
                // The key ran out of bytes inside the compressed path, so it
                // must be a prefix of an existing key.
                return Err(InsertPrefixError {
                    byte_repr: key.into(),
                });
            }
            let new_leaf_key_byte = key[key_bytes_used + matched_bytes];

            // The matched portion of the old prefix becomes the prefix of a
            // new Node4 that holds the old node and the new leaf.
            let mut new_n4 = InnerNode4::from_header(Header::new(
                NodeType::Node4,
                &header_snapshot.read_prefix()[..matched_bytes.min(NUM_PREFIX_BYTES)],
                matched_bytes,
            ));

            if header_snapshot.prefix_len() < NUM_PREFIX_BYTES {
                // The old prefix is stored in full; the edge byte and the
                // remaining prefix come straight out of the header.
                let edge_key_byte = header_snapshot.read_prefix()[matched_bytes];
                new_n4.write_child(edge_key_byte, mismatched_inner_node_ptr);

                // SAFETY: The previous header reference was dropped; this one
                // is the only live reference into the node.
                let header = unsafe { mismatched_inner_node_ptr.header_mut() }
                    .expect("MismatchPrefix implies an inner node");
                header.ltrim_prefix(matched_bytes + 1);
            } else {
                // The old prefix extends past the stored bytes. Reconstruct
                // it from the minimum leaf to find the edge byte and to
                // refill the stored portion after the split point.
                //
                // SAFETY: No other reference into the subtree is live.
                let min_value = unsafe { minimum_unchecked(mismatched_inner_node_ptr) };
                let min_key = source.load_key(min_value);
                let min_key = min_key.as_ref();

                let edge_key_byte = min_key[key_bytes_used + matched_bytes];
                new_n4.write_child(edge_key_byte, mismatched_inner_node_ptr);

                let new_prefix_len = header_snapshot.prefix_len() - (matched_bytes + 1);
                let refill_start = key_bytes_used + matched_bytes + 1;
                let refill_end =
                    (refill_start + new_prefix_len.min(NUM_PREFIX_BYTES)).min(min_key.len());

                // SAFETY: No other reference into the node is live.
                let header = unsafe { mismatched_inner_node_ptr.header_mut() }
                    .expect("MismatchPrefix implies an inner node");
                header.set_prefix(&min_key[refill_start..refill_end], new_prefix_len);
            }

            new_n4.write_child(new_leaf_key_byte, OpaqueNodePtr::make_leaf(value));

            NodePtr::allocate_node(new_n4).to_opaque()
        },
        InsertKind::SplitLeaf { leaf_value } => {
            let leaf_key = source.load_key(leaf_value);
            let leaf_key_bytes = leaf_key.as_ref();

            if leaf_key_bytes == key {
                // The key is already present; swap the value in the slot the
                // old leaf occupied.
                let new_leaf = OpaqueNodePtr::make_leaf(value);
                return Ok(
                    if let Some((parent_ptr, parent_key_byte)) = parent_ptr_and_child_key_byte {
                        // SAFETY: Covered by the containing function.
                        unsafe { replace_child_in_parent(parent_ptr, parent_key_byte, new_leaf) };
                        InsertResult {
                            existing_value: Some(leaf_value),
                            new_root: root,
                        }
                    } else {
                        InsertResult {
                            existing_value: Some(leaf_value),
                            new_root: new_leaf,
                        }
                    },
                );
            }

            // The two keys diverge somewhere past the current depth; the
            // common portion becomes the prefix of a new Node4 holding both
            // leaves.
            let prefix_size = leaf_key_bytes[key_bytes_used.min(leaf_key_bytes.len())..]
                .iter()
                .zip(key[key_bytes_used..].iter())
                .take_while(|(leaf_byte, key_byte)| leaf_byte == key_byte)
                .count();

            if key_bytes_used + prefix_size >= key.len()
                || key_bytes_used + prefix_size >= leaf_key_bytes.len()
            {
                // One key is a prefix of the other.
                return Err(InsertPrefixError {
                    byte_repr: key.into(),
                });
            }

            let mut new_n4 = InnerNode4::from_header(Header::new(
                NodeType::Node4,
                &key[key_bytes_used..(key_bytes_used + prefix_size.min(NUM_PREFIX_BYTES))],
                prefix_size,
            ));
            new_n4.write_child(
                leaf_key_bytes[key_bytes_used + prefix_size],
                OpaqueNodePtr::make_leaf(leaf_value),
            );
            new_n4.write_child(
                key[key_bytes_used + prefix_size],
                OpaqueNodePtr::make_leaf(value),
            );

            NodePtr::allocate_node(new_n4).to_opaque()
        },
        InsertKind::IntoExisting { inner_node_ptr } => {
            // SAFETY: Covered by the containing function.
            unsafe {
                write_new_child_in_existing_node(
                    inner_node_ptr,
                    key[key_bytes_used],
                    OpaqueNodePtr::make_leaf(value),
                )
            }
        },
    };

    if let Some((parent_ptr, parent_key_byte)) = parent_ptr_and_child_key_byte {
        // SAFETY: Covered by the containing function.
        unsafe { replace_child_in_parent(parent_ptr, parent_key_byte, new_inner_node) };

        // If there was a parent, the root node was not the insert point and
        // is unchanged.
        Ok(InsertResult {
            existing_value: None,
            new_root: root,
        })
    } else {
        // The root node was a leaf or the split occurred at the root, so the
        // new inner node becomes the root.
        Ok(InsertResult {
            existing_value: None,
            new_root: new_inner_node,
        })
    }
}

/// Write a new child into the given inner node, growing it to the next-larger
/// representation first if it is full.
///
/// Returns the pointer that must occupy the node's slot in its parent after
/// the write: the original node, or its grown replacement.
///
/// # Safety
///
///  - `inner_node_ptr` must be a unique pointer to the node; no other
///    references into the node may exist while this function runs.
unsafe fn write_new_child_in_existing_node(
    inner_node_ptr: OpaqueNodePtr,
    new_leaf_key_byte: u8,
    new_leaf_ptr: OpaqueNodePtr,
) -> OpaqueNodePtr {
    fn write_new_child_in_existing_inner_node<N: InnerNode>(
        inner_node_ptr: NodePtr<N>,
        new_leaf_key_byte: u8,
        new_leaf_ptr: OpaqueNodePtr,
    ) -> OpaqueNodePtr {
        // SAFETY: The `inner_node` reference lasts only for the duration of
        // this function, and the node is not read or written through any
        // other source, per the requirements on the containing function.
        let inner_node = unsafe { inner_node_ptr.as_mut() };

        if inner_node.is_full() {
            let mut grown_node = inner_node.grow();
            grown_node.write_child(new_leaf_key_byte, new_leaf_ptr);

            let grown_node_ptr = NodePtr::allocate_node(grown_node).to_opaque();

            // SAFETY: The uniqueness requirement is passed up to the caller.
            // `inner_node` is not used again after this point.
            unsafe { NodePtr::deallocate_node(inner_node_ptr) };

            grown_node_ptr
        } else {
            inner_node.write_child(new_leaf_key_byte, new_leaf_ptr);

            inner_node_ptr.to_opaque()
        }
    }

    match inner_node_ptr.to_node_ptr() {
        ConcreteNodePtr::Node4(inner_ptr) => {
            write_new_child_in_existing_inner_node(inner_ptr, new_leaf_key_byte, new_leaf_ptr)
        },
        ConcreteNodePtr::Node16(inner_ptr) => {
            write_new_child_in_existing_inner_node(inner_ptr, new_leaf_key_byte, new_leaf_ptr)
        },
        ConcreteNodePtr::Node48(inner_ptr) => {
            write_new_child_in_existing_inner_node(inner_ptr, new_leaf_key_byte, new_leaf_ptr)
        },
        ConcreteNodePtr::Node256(inner_ptr) => {
            write_new_child_in_existing_inner_node(inner_ptr, new_leaf_key_byte, new_leaf_ptr)
        },
        ConcreteNodePtr::Leaf(_) => {
            unreachable!("cannot insert a child into a leaf")
        },
    }
}

/// Replace the child at `key_byte` of the given parent node with `new_child`.
///
/// # Safety
///
///  - `parent_ptr` must be a unique pointer to the node; no other references
///    into the node may exist while this function runs.
pub(crate) unsafe fn replace_child_in_parent(
    parent_ptr: OpaqueNodePtr,
    key_byte: u8,
    new_child: OpaqueNodePtr,
) {
    fn replace_in_inner_node<N: InnerNode>(
        parent_ptr: NodePtr<N>,
        key_byte: u8,
        new_child: OpaqueNodePtr,
    ) {
        // SAFETY: The lifetime of the reference is bounded to this function.
        // Uniqueness is enforced by the requirements on the containing
        // function.
        let parent_node = unsafe { parent_ptr.as_mut() };

        parent_node.overwrite_child(key_byte, new_child);
    }

    match parent_ptr.to_node_ptr() {
        ConcreteNodePtr::Node4(inner_ptr) => replace_in_inner_node(inner_ptr, key_byte, new_child),
        ConcreteNodePtr::Node16(inner_ptr) => replace_in_inner_node(inner_ptr, key_byte, new_child),
        ConcreteNodePtr::Node48(inner_ptr) => replace_in_inner_node(inner_ptr, key_byte, new_child),
        ConcreteNodePtr::Node256(inner_ptr) => {
            replace_in_inner_node(inner_ptr, key_byte, new_child)
        },
        ConcreteNodePtr::Leaf(_) => {
            unreachable!("a leaf cannot be the parent of another node")
        },
    }
}

/// The results of a successful tree insert.
#[derive(Debug)]
pub struct InsertResult {
    /// The value previously stored under the insert key, if present.
    pub existing_value: Option<usize>,
    /// The new tree root after the successful insert.
    pub new_root: OpaqueNodePtr,
}

/// Attempted to insert a key which was a prefix of an existing key in the
/// tree.
#[derive(Clone, PartialEq, Eq)]
pub struct InsertPrefixError {
    /// The key that was the input to the insert operation.
    pub byte_repr: Box<[u8]>,
}

impl fmt::Debug for InsertPrefixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertPrefixError")
            .field("byte_repr", &self.byte_repr)
            .finish()
    }
}

impl fmt::Display for InsertPrefixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attempted to insert a key [{:?}] which is either a prefix of an existing key or an \
             existing key is a prefix of the new key.",
            self.byte_repr
        )
    }
}

impl Error for InsertPrefixError {}

/// The results from searching for an insert point for a new leaf in the tree.
///
/// It contains all the relevant information needed to perform the insert and
/// update the tree.
#[derive(Debug)]
pub struct InsertPoint {
    /// The parent node pointer and key byte that points to the main insert
    /// point.
    ///
    /// In the case that the root node is the main insert point, this will
    /// have a `None` value.
    pub parent_ptr_and_child_key_byte: Option<(OpaqueNodePtr, u8)>,
    /// The type of operation that needs to be performed to insert the key.
    pub insert_kind: InsertKind,
    /// The number of bytes that were read from the key to find the insert
    /// point.
    pub key_bytes_used: usize,
}

/// The type of insert that must be performed.
#[derive(Debug)]
pub enum InsertKind {
    /// An insert where an inner node had a prefix that diverged from the key.
    ///
    /// This insert will create a new inner node holding the matched portion
    /// of the prefix, and reparent the existing inner node under it.
    MismatchPrefix {
        /// The number of prefix bytes that matched before the divergence.
        matched_bytes: usize,
        /// A pointer to the inner node whose prefix diverged.
        mismatched_inner_node_ptr: OpaqueNodePtr,
    },
    /// An insert where the search terminated at an existing leaf.
    ///
    /// This insert will create a new inner node holding the existing leaf and
    /// the new leaf as children, unless the keys are equal, in which case the
    /// stored value is replaced.
    SplitLeaf {
        /// The value of the existing leaf.
        leaf_value: usize,
    },
    /// An insert where the search terminated at an inner node that did not
    /// have a child for the next key byte.
    ///
    /// If the inner node is full, it will be grown to the next largest size
    /// before the new leaf is added.
    IntoExisting {
        /// A pointer to the inner node which will receive the new leaf.
        inner_node_ptr: OpaqueNodePtr,
    },
}

/// Perform an iterative search for the insert point for the given key,
/// starting at the given root node.
///
/// # Errors
///
///  - Returns an [`InsertPrefixError`] if the given key runs out of bytes
///    while inner nodes remain below, meaning it is a prefix of an existing
///    key.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
pub unsafe fn search_for_insert_point<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    source: &S,
) -> Result<InsertPoint, InsertPrefixError> {
    fn test_prefix_identify_insert<N, S>(
        inner_ptr: NodePtr<N>,
        key: &[u8],
        current_depth: &mut usize,
        source: &S,
    ) -> Result<ControlFlow<usize, Option<OpaqueNodePtr>>, InsertPrefixError>
    where
        N: InnerNode,
        S: KeySource,
    {
        // SAFETY: The lifetime of the produced reference is bounded to this
        // scope. No mutation happens concurrently, enforced by the
        // requirements on `search_for_insert_point`.
        let inner_node = unsafe { inner_ptr.as_ref() };
        let header = inner_node.header();

        // SAFETY: Covered by the requirements on `search_for_insert_point`.
        let matched_bytes = unsafe { match_full_prefix(inner_node, key, *current_depth, source) };
        if matched_bytes != header.prefix_len() {
            return Ok(ControlFlow::Break(matched_bytes));
        }

        // The prefix matched in full, advance the depth past it.
        *current_depth += matched_bytes;

        let Some(next_key_fragment) = key.get(*current_depth).copied() else {
            // The key has no bytes left to pick a child with, so it must be a
            // prefix of an existing key.
            return Err(InsertPrefixError {
                byte_repr: key.into(),
            });
        };

        Ok(ControlFlow::Continue(
            inner_node.lookup_child(next_key_fragment),
        ))
    }

    let mut current_parent = None;
    let mut current_node = root;
    let mut current_depth = 0;

    loop {
        let lookup_result = match current_node.to_node_ptr() {
            ConcreteNodePtr::Node4(inner_ptr) => {
                test_prefix_identify_insert(inner_ptr, key, &mut current_depth, source)
            },
            ConcreteNodePtr::Node16(inner_ptr) => {
                test_prefix_identify_insert(inner_ptr, key, &mut current_depth, source)
            },
            ConcreteNodePtr::Node48(inner_ptr) => {
                test_prefix_identify_insert(inner_ptr, key, &mut current_depth, source)
            },
            ConcreteNodePtr::Node256(inner_ptr) => {
                test_prefix_identify_insert(inner_ptr, key, &mut current_depth, source)
            },
            ConcreteNodePtr::Leaf(leaf_value) => {
                return Ok(InsertPoint {
                    key_bytes_used: current_depth,
                    parent_ptr_and_child_key_byte: current_parent,
                    insert_kind: InsertKind::SplitLeaf { leaf_value },
                });
            },
        }?;

        match lookup_result {
            ControlFlow::Continue(next_child_node) => match next_child_node {
                Some(next_child_node) => {
                    current_parent = Some((current_node, key[current_depth]));
                    current_node = next_child_node;
                    // Consume the key byte that selected the child.
                    current_depth += 1;
                },
                None => {
                    return Ok(InsertPoint {
                        key_bytes_used: current_depth,
                        insert_kind: InsertKind::IntoExisting {
                            inner_node_ptr: current_node,
                        },
                        parent_ptr_and_child_key_byte: current_parent,
                    });
                },
            },
            ControlFlow::Break(matched_bytes) => {
                return Ok(InsertPoint {
                    key_bytes_used: current_depth,
                    insert_kind: InsertKind::MismatchPrefix {
                        matched_bytes,
                        mismatched_inner_node_ptr: current_node,
                    },
                    parent_ptr_and_child_key_byte: current_parent,
                });
            },
        };
    }
}

#[cfg(test)]
mod tests;
