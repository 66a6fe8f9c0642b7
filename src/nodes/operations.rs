//! Trie node lookup and manipulation

use crate::{ConcreteNodePtr, InnerNode, NodePtr, OpaqueNodePtr};

mod delete;
pub use delete::*;

mod insert;
pub use insert::*;

mod lookup;
pub use lookup::*;

mod minmax;
pub use minmax::*;

/// Deallocate every inner node in the tree rooted at the given node.
///
/// Tagged leaves carry their value in the reference word and own no
/// allocation, so only inner nodes are released.
///
/// # Safety
///
///  - The `root` [`OpaqueNodePtr`] must be a unique pointer to the underlying
///    tree; no other pointers into the tree may be used after this call.
///  - This function cannot be called concurrently with any reads or writes of
///    `root` or any child node of `root`.
pub unsafe fn deallocate_tree(root: OpaqueNodePtr) {
    fn push_children_then_deallocate<N: InnerNode>(
        node_ptr: NodePtr<N>,
        stack: &mut Vec<OpaqueNodePtr>,
    ) {
        {
            // SAFETY: The reference is dropped before the node is
            // deallocated. Uniqueness is guaranteed by the requirements on
            // `deallocate_tree`.
            let node = unsafe { node_ptr.as_ref() };
            stack.extend(node.iter().map(|(_, child)| child));
        }

        // SAFETY: Each node is reachable through exactly one parent slot, so
        // the traversal visits (and deallocates) it exactly once.
        unsafe { NodePtr::deallocate_node(node_ptr) };
    }

    let mut stack = vec![root];

    while let Some(next) = stack.pop() {
        match next.to_node_ptr() {
            ConcreteNodePtr::Node4(node_ptr) => push_children_then_deallocate(node_ptr, &mut stack),
            ConcreteNodePtr::Node16(node_ptr) => {
                push_children_then_deallocate(node_ptr, &mut stack)
            },
            ConcreteNodePtr::Node48(node_ptr) => {
                push_children_then_deallocate(node_ptr, &mut stack)
            },
            ConcreteNodePtr::Node256(node_ptr) => {
                push_children_then_deallocate(node_ptr, &mut stack)
            },
            ConcreteNodePtr::Leaf(_) => {},
        }
    }
}
