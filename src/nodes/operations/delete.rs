use crate::{
    nodes::operations::{
        insert::replace_child_in_parent,
        lookup::{check_full_prefix_lookup_child, leaf_matches},
    },
    ConcreteNodePtr, InnerNode, KeySource, NodePtr, OpaqueNodePtr,
};

/// Remove the child for `key_fragment` from the given inner node and
/// restructure the node if the removal left it underfull.
///
/// Returns the pointer that must replace the node in its parent's slot, if
/// the node was restructured: the remaining child after a one-way collapse,
/// or the shrunken replacement node. Returns `None` if the node was only
/// modified in place.
///
/// Collapsing a one-way node folds its compressed path and its single
/// remaining edge byte into the child's path: the child's new prefix is
/// `parent prefix + edge byte + child prefix`, with the stored portion
/// truncated to the cap and the logical length summed. A leaf child has no
/// path to extend and absorbs nothing.
///
/// # Safety
///
///  - `inner_node_ptr` must be a unique pointer to the node; neither it nor
///    any of its children may have other live references while this function
///    runs.
unsafe fn remove_child_from_inner_node_and_compress<N: InnerNode>(
    inner_node_ptr: NodePtr<N>,
    key_fragment: u8,
) -> Option<OpaqueNodePtr> {
    // SAFETY: The `inner_node` reference is scoped to this function and
    // dropped before the node is deallocated. It is a unique reference, by
    // the safety requirements of the containing function.
    let inner_node = unsafe { inner_node_ptr.as_mut() };

    inner_node
        .remove_child(key_fragment)
        .expect("child to remove must be present");

    let num_children = inner_node.header().num_children();

    if num_children == 1 {
        // One-way node; replace it with its remaining child. Only a Node4
        // can reach this point because the larger types shrink before their
        // counts get anywhere near 1.
        let (child_key_byte, child_node_ptr) = inner_node.min();

        // SAFETY: The child is a different allocation than the parent, so
        // the two references do not alias. Uniqueness is covered by the
        // requirements on this function.
        if let Some(child_header) = unsafe { child_node_ptr.header_mut() } {
            let parent_header = inner_node.header();

            let (old_prefix, old_prefix_len, old_capped_len) = child_header.clear_prefix();
            child_header.push_prefix(parent_header.read_prefix(), parent_header.prefix_len());
            child_header.push_prefix(&[child_key_byte], 1);
            child_header.push_prefix(&old_prefix[..old_capped_len], old_prefix_len);
        }
        // A leaf child carries no header; the collapsed path is implicit in
        // the key bytes it reconstructs.

        // SAFETY: This function requires a unique pointer to the node, so no
        // other code can deallocate it. `inner_node` is not used past here.
        unsafe { NodePtr::deallocate_node(inner_node_ptr) };

        Some(child_node_ptr)
    } else if N::TYPE.should_shrink(num_children) {
        let shrunken_node = inner_node.shrink();
        let shrunken_node_ptr = NodePtr::allocate_node(shrunken_node).to_opaque();

        // SAFETY: This function requires a unique pointer to the node, so no
        // other code can deallocate it. `inner_node` is not used past here.
        unsafe { NodePtr::deallocate_node(inner_node_ptr) };

        Some(shrunken_node_ptr)
    } else {
        None
    }
}

/// Remove the given non-root leaf from its parent node.
///
/// # Safety
///
///  - `parent_node_ptr` and `grandparent_node_ptr` must be unique pointers to
///    their nodes; neither they nor any children of `parent_node_ptr` may
///    have other live references while this function runs.
unsafe fn inner_delete_non_root_unchecked(
    leaf_value: usize,
    (parent_node_ptr, parent_key_byte): (OpaqueNodePtr, u8),
    grandparent_node_ptr: Option<(OpaqueNodePtr, u8)>,
    original_root: OpaqueNodePtr,
) -> DeleteResult {
    let new_parent_node_ptr = match parent_node_ptr.to_node_ptr() {
        ConcreteNodePtr::Node4(parent_node_ptr) => unsafe {
            // SAFETY (all arms): covered by the containing function.
            remove_child_from_inner_node_and_compress(parent_node_ptr, parent_key_byte)
        },
        ConcreteNodePtr::Node16(parent_node_ptr) => unsafe {
            remove_child_from_inner_node_and_compress(parent_node_ptr, parent_key_byte)
        },
        ConcreteNodePtr::Node48(parent_node_ptr) => unsafe {
            remove_child_from_inner_node_and_compress(parent_node_ptr, parent_key_byte)
        },
        ConcreteNodePtr::Node256(parent_node_ptr) => unsafe {
            remove_child_from_inner_node_and_compress(parent_node_ptr, parent_key_byte)
        },
        ConcreteNodePtr::Leaf(_) => unreachable!("a leaf cannot be the parent of another node"),
    };

    // If the parent node was replaced by something else, the new pointer has
    // to be written into the grandparent.
    if let Some(new_parent_node_ptr) = new_parent_node_ptr {
        if let Some((grandparent_node_ptr, grandparent_key_byte)) = grandparent_node_ptr {
            // SAFETY: Covered by the containing function.
            unsafe {
                replace_child_in_parent(
                    grandparent_node_ptr,
                    grandparent_key_byte,
                    new_parent_node_ptr,
                )
            };
        }
    }

    let new_root = match (new_parent_node_ptr, grandparent_node_ptr) {
        // The parent was the root and was replaced.
        (Some(new_parent_node_ptr), None) => new_parent_node_ptr,
        _ => original_root,
    };

    DeleteResult {
        new_root: Some(new_root),
        deleted_value: leaf_value,
    }
}

/// The results of a successful delete operation.
#[derive(Debug)]
pub struct DeleteResult {
    /// The new root node for the tree, after the delete has been applied.
    ///
    /// If `None`, the tree is now empty.
    pub new_root: Option<OpaqueNodePtr>,
    /// The value of the leaf that was deleted.
    pub deleted_value: usize,
}

/// All the information needed to delete a leaf that has been located in the
/// tree.
#[derive(Debug)]
pub struct DeletePoint {
    /// The grandparent node of the leaf that will be deleted and the key byte
    /// that was used to continue search.
    ///
    /// If there is no grandparent, this value is `None`.
    pub grandparent_ptr_and_parent_key_byte: Option<(OpaqueNodePtr, u8)>,
    /// The parent node of the leaf that will be deleted and the key byte that
    /// was used to continue search.
    ///
    /// If the leaf to delete is the root, this value is `None`. If the
    /// grandparent is present, this value must also be present.
    pub parent_ptr_and_child_key_byte: Option<(OpaqueNodePtr, u8)>,
    /// The value of the leaf to delete.
    pub leaf_value: usize,
}

impl DeletePoint {
    /// Handle the logic of deleting the located leaf from the tree.
    ///
    /// # Safety
    ///
    ///  - The `root` [`OpaqueNodePtr`] must be a unique pointer to the
    ///    underlying tree.
    ///  - This function cannot be called concurrently with any reads or
    ///    writes of `root` or any child node of `root`. This function will
    ///    arbitrarily read or write to any child in the given tree.
    pub unsafe fn apply(self, root: OpaqueNodePtr) -> DeleteResult {
        let DeletePoint {
            grandparent_ptr_and_parent_key_byte,
            parent_ptr_and_child_key_byte,
            leaf_value,
        } = self;

        match (
            parent_ptr_and_child_key_byte,
            grandparent_ptr_and_parent_key_byte,
        ) {
            (None, None) => {
                // The leaf is the root; the tree becomes empty. A tagged
                // leaf owns no allocation, so there is nothing to release.
                DeleteResult {
                    new_root: None,
                    deleted_value: leaf_value,
                }
            },
            (None, Some(grandparent_node_ptr)) => {
                unreachable!(
                    "impossible to have a missing parent node and a present grandparent node \
                     [{grandparent_node_ptr:?}]",
                );
            },
            (Some(parent_node_ptr), grandparent_node_ptr) => unsafe {
                // SAFETY: `root` is a unique pointer to the tree and there
                // are no concurrent reads or writes, so all child pointers
                // are unique and unaliased.
                inner_delete_non_root_unchecked(
                    leaf_value,
                    parent_node_ptr,
                    grandparent_node_ptr,
                    root,
                )
            },
        }
    }
}

/// Search in the given tree for the leaf to delete, returning `None` if the
/// key is not present.
///
/// The descent verifies every compressed path in full, reconstructing bytes
/// past the stored cap from the relevant subtree minimum.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
pub unsafe fn search_for_delete_point<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    source: &S,
) -> Option<DeletePoint> {
    let mut current_grandparent = None;
    let mut current_parent = None;
    let mut current_node = root;
    let mut current_depth = 0;

    loop {
        let next_node = match current_node.to_node_ptr() {
            ConcreteNodePtr::Node4(inner_ptr) => {
                // SAFETY (all inner arms): the reference does not outlive the
                // iteration, and the prefix check's safety requirements are
                // covered by the requirements on this function.
                let inner_node = unsafe { inner_ptr.as_ref() };
                unsafe {
                    check_full_prefix_lookup_child(inner_node, key, &mut current_depth, source)
                }
            },
            ConcreteNodePtr::Node16(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                unsafe {
                    check_full_prefix_lookup_child(inner_node, key, &mut current_depth, source)
                }
            },
            ConcreteNodePtr::Node48(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                unsafe {
                    check_full_prefix_lookup_child(inner_node, key, &mut current_depth, source)
                }
            },
            ConcreteNodePtr::Node256(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                unsafe {
                    check_full_prefix_lookup_child(inner_node, key, &mut current_depth, source)
                }
            },
            ConcreteNodePtr::Leaf(leaf_value) => {
                // Match the reconstructed leaf key against the full search
                // key to confirm this is the right leaf.
                return leaf_matches(leaf_value, key, current_depth, source).then_some(
                    DeletePoint {
                        grandparent_ptr_and_parent_key_byte: current_grandparent,
                        parent_ptr_and_child_key_byte: current_parent,
                        leaf_value,
                    },
                );
            },
        }?;

        debug_assert!(
            current_depth > 0,
            "descending into a child must consume at least one key byte"
        );

        let last_key_byte = key[current_depth - 1];
        current_grandparent = current_parent;
        current_parent = Some((current_node, last_key_byte));
        current_node = next_node;
    }
}

/// Delete the value stored with the given key, returning it if present.
///
/// # Safety
///
///  - The `root` [`OpaqueNodePtr`] must be a unique pointer to the underlying
///    tree.
///  - This function cannot be called concurrently with any reads or writes of
///    `root` or any child node of `root`. This function will arbitrarily read
///    or write to any child in the given tree.
pub unsafe fn delete_unchecked<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    source: &S,
) -> Option<DeleteResult> {
    // SAFETY: Covered by the requirements on the containing function.
    let delete_point = unsafe { search_for_delete_point(root, key, source)? };

    // SAFETY: Covered by the requirements on the containing function.
    Some(unsafe { delete_point.apply(root) })
}
