use crate::{ConcreteNodePtr, InnerNode, NodePtr, OpaqueNodePtr};

/// Search for the leaf with the minimum key, by lexicographic ordering, and
/// return its value.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
///
/// # Panics
///
///  - Panics if the tree at the root node is not well-formed: every inner
///    node must have at least one child and there must be no loops.
pub unsafe fn minimum_unchecked(root: OpaqueNodePtr) -> usize {
    fn get_next_node<N: InnerNode>(inner_node: NodePtr<N>) -> OpaqueNodePtr {
        // SAFETY: The lifetime of the produced reference is bounded to this
        // scope and does not escape. No other code mutates the referenced
        // node, enforced by the "no concurrent reads or writes" requirement
        // on `minimum_unchecked`.
        let inner_node = unsafe { inner_node.as_ref() };

        inner_node.min().1
    }

    let mut current_node = root;

    loop {
        current_node = match current_node.to_node_ptr() {
            ConcreteNodePtr::Node4(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node16(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node48(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node256(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Leaf(value) => {
                return value;
            },
        }
    }
}

/// Search for the leaf with the maximum key, by lexicographic ordering, and
/// return its value.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
///
/// # Panics
///
///  - Panics if the tree at the root node is not well-formed: every inner
///    node must have at least one child and there must be no loops.
pub unsafe fn maximum_unchecked(root: OpaqueNodePtr) -> usize {
    fn get_next_node<N: InnerNode>(inner_node: NodePtr<N>) -> OpaqueNodePtr {
        // SAFETY: The lifetime of the produced reference is bounded to this
        // scope and does not escape. No other code mutates the referenced
        // node, enforced by the "no concurrent reads or writes" requirement
        // on `maximum_unchecked`.
        let inner_node = unsafe { inner_node.as_ref() };

        inner_node.max().1
    }

    let mut current_node = root;

    loop {
        current_node = match current_node.to_node_ptr() {
            ConcreteNodePtr::Node4(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node16(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node48(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Node256(inner_node) => get_next_node(inner_node),
            ConcreteNodePtr::Leaf(value) => {
                return value;
            },
        }
    }
}
