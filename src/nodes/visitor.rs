//! Utilities for inspecting the trie structure.

mod tree_stats;
mod well_formed;

pub use tree_stats::*;
pub use well_formed::*;

use crate::{ConcreteNodePtr, InnerNode, InnerNode16, InnerNode256, InnerNode4, InnerNode48,
            OpaqueNodePtr};

/// The `Visitable` trait allows [`Visitor`]s to traverse the structure of the
/// implementing type and produce some output.
pub trait Visitable {
    /// This function provides the default traversal behavior for the
    /// implementing type.
    ///
    /// The implementation should call `visit_with(visitor)` for all relevant
    /// sub-fields of the type. If there are no relevant sub-fields, it should
    /// just produce the default output.
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output;

    /// This function will traverse the implementing type and execute any
    /// specific logic from the given [`Visitor`].
    ///
    /// It should be overridden for types that have corresponding hooks in the
    /// [`Visitor`] trait, to call the matching hook.
    fn visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        self.super_visit_with(visitor)
    }
}

impl Visitable for OpaqueNodePtr {
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        // SAFETY (all arms): visitors are only started through entry points
        // that guarantee no concurrent mutation of the tree, and the
        // references do not outlive the dispatch.
        match self.to_node_ptr() {
            ConcreteNodePtr::Node4(inner) => unsafe { inner.as_ref() }.visit_with(visitor),
            ConcreteNodePtr::Node16(inner) => unsafe { inner.as_ref() }.visit_with(visitor),
            ConcreteNodePtr::Node48(inner) => unsafe { inner.as_ref() }.visit_with(visitor),
            ConcreteNodePtr::Node256(inner) => unsafe { inner.as_ref() }.visit_with(visitor),
            ConcreteNodePtr::Leaf(value) => visitor.visit_leaf(value),
        }
    }
}

impl Visitable for InnerNode4 {
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        combine_inner_node_child_output(self.iter(), visitor)
    }

    fn visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        visitor.visit_node4(self)
    }
}

impl Visitable for InnerNode16 {
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        combine_inner_node_child_output(self.iter(), visitor)
    }

    fn visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        visitor.visit_node16(self)
    }
}

impl Visitable for InnerNode48 {
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        combine_inner_node_child_output(self.iter(), visitor)
    }

    fn visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        visitor.visit_node48(self)
    }
}

impl Visitable for InnerNode256 {
    fn super_visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        combine_inner_node_child_output(self.iter(), visitor)
    }

    fn visit_with<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        visitor.visit_node256(self)
    }
}

/// The `Visitor` trait allows creating new operations on the radix tree by
/// overriding specific handling methods for each of the node types.
pub trait Visitor: Sized {
    /// The type of value that the visitor produces.
    type Output;

    /// Produce the default value of the [`Self::Output`] type.
    fn default_output(&self) -> Self::Output;

    /// Combine two instances of the [`Self::Output`] type for this
    /// [`Visitor`].
    fn combine_output(&self, o1: Self::Output, o2: Self::Output) -> Self::Output;

    /// Visit an [`InnerNode4`].
    fn visit_node4(&mut self, t: &InnerNode4) -> Self::Output {
        t.super_visit_with(self)
    }

    /// Visit an [`InnerNode16`].
    fn visit_node16(&mut self, t: &InnerNode16) -> Self::Output {
        t.super_visit_with(self)
    }

    /// Visit an [`InnerNode48`].
    fn visit_node48(&mut self, t: &InnerNode48) -> Self::Output {
        t.super_visit_with(self)
    }

    /// Visit an [`InnerNode256`].
    fn visit_node256(&mut self, t: &InnerNode256) -> Self::Output {
        t.super_visit_with(self)
    }

    /// Visit a tagged leaf carrying the given value.
    fn visit_leaf(&mut self, value: usize) -> Self::Output {
        let _ = value;
        self.default_output()
    }
}

fn combine_inner_node_child_output<V: Visitor>(
    mut iter: impl Iterator<Item = (u8, OpaqueNodePtr)>,
    visitor: &mut V,
) -> V::Output {
    if let Some((_, first)) = iter.next() {
        let mut accum = first.visit_with(visitor);
        for (_, child) in iter {
            let output = child.visit_with(visitor);
            accum = visitor.combine_output(accum, output);
        }

        accum
    } else {
        visitor.default_output()
    }
}
