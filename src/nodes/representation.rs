//! Trie node representation

use std::{
    error::Error,
    fmt,
    mem::MaybeUninit,
    ops::RangeInclusive,
    ptr::NonNull,
};

use crate::{
    rust_nightly_apis::maybe_uninit_slice_assume_init_ref, tagged_pointer::TaggedPointer,
};

mod header;
pub use header::*;

#[cfg(test)]
mod tests;

/// The representation of inner nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    /// Node that references between 2 and 4 children
    Node4 = 0,
    /// Node that references between 5 and 16 children
    Node16,
    /// Node that references between 17 and 48 children
    Node48,
    /// Node that references between 49 and 256 children
    Node256,
}

impl NodeType {
    /// The upper bound on the number of children this node type can hold.
    pub const fn upper_capacity(self) -> usize {
        match self {
            NodeType::Node4 => 4,
            NodeType::Node16 => 16,
            NodeType::Node48 => 48,
            NodeType::Node256 => 256,
        }
    }

    /// The range of child counts a settled node of this type can hold.
    ///
    /// The lower bounds sit below the next-smaller type's capacity because
    /// shrink transitions fire with hysteresis: a [`NodeType::Node16`] only
    /// shrinks once its count drops to 3, so a count of 4 is legal for it,
    /// and similarly for the larger types.
    pub const fn capacity_range(self) -> RangeInclusive<usize> {
        match self {
            NodeType::Node4 => 2..=4,
            NodeType::Node16 => 4..=16,
            NodeType::Node48 => 13..=48,
            NodeType::Node256 => 38..=256,
        }
    }

    /// Return true if an erase that left `num_children` children behind must
    /// shrink the node to the next-smaller representation.
    ///
    /// The thresholds are offset below the grow boundaries so that an
    /// insert/erase sequence hovering around a capacity does not thrash
    /// between representations. A [`NodeType::Node4`] never shrinks; it
    /// collapses into its remaining child when its count reaches 1.
    pub const fn should_shrink(self, num_children: usize) -> bool {
        match self {
            NodeType::Node4 => false,
            NodeType::Node16 => num_children == 3,
            NodeType::Node48 => num_children == 12,
            NodeType::Node256 => num_children == 37,
        }
    }
}

/// Flip the sign bit of a byte.
///
/// [`InnerNode16`] stores its key bytes with the sign bit flipped so that
/// signed SIMD byte comparisons implement the unsigned order.
pub(crate) const fn flip_sign(key_byte: u8) -> u8 {
    key_byte ^ 0b1000_0000
}

/// An opaque reference to any node in the tree.
///
/// The reference is a single word: either a pointer to one of the four inner
/// node types (which all start with a [`Header`]), or a tagged leaf carrying
/// the stored value inline. Leaves are never allocated.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueNodePtr(TaggedPointer<Header>);

impl OpaqueNodePtr {
    /// The largest value that can be stored in a tagged leaf.
    pub const MAX_LEAF_VALUE: usize = TaggedPointer::<Header>::MAX_VALUE;

    /// Pack `value` into a tagged leaf reference.
    ///
    /// # Panics
    ///
    ///  - Panics if `value` is larger than [`Self::MAX_LEAF_VALUE`].
    pub fn make_leaf(value: usize) -> Self {
        OpaqueNodePtr(TaggedPointer::from_value(value))
    }

    /// Return `true` if this reference is a tagged leaf.
    pub fn is_leaf(self) -> bool {
        self.0.is_value()
    }

    /// Return the value carried by this reference, if it is a tagged leaf.
    pub fn as_leaf_value(self) -> Option<usize> {
        self.0.to_value()
    }

    /// Return `true` if this reference points to the given concrete inner
    /// node type.
    pub fn is<N: InnerNode>(self) -> bool {
        match self.0.to_ptr() {
            // SAFETY: A non-leaf `OpaqueNodePtr` is only constructed through
            // `NodePtr::to_opaque` from a live allocation that starts with a
            // `Header`, so the header read is valid.
            Some(header_ptr) => unsafe { (*header_ptr.as_ptr()).node_type() == N::TYPE },
            None => false,
        }
    }

    /// Cast this opaque reference to an enum over the concrete node types.
    pub fn to_node_ptr(self) -> ConcreteNodePtr {
        let header_ptr = match self.0.to_ptr() {
            Some(header_ptr) => header_ptr,
            None => {
                // PANIC SAFETY: `to_ptr` returned `None`, so the word is a
                // tagged value.
                return ConcreteNodePtr::Leaf(self.0.to_value().unwrap());
            },
        };

        // SAFETY: A non-leaf `OpaqueNodePtr` is only constructed through
        // `NodePtr::to_opaque` from a live allocation that starts with a
        // `Header`, so the header read is valid.
        let node_type = unsafe { (*header_ptr.as_ptr()).node_type() };

        // SAFETY (all arms): every inner node type is `repr(C)` with the
        // `Header` as its first field, and the header's `node_type` is set
        // once at construction to match the containing type. Casting the
        // header pointer back to the concrete node type is therefore valid.
        match node_type {
            NodeType::Node4 => ConcreteNodePtr::Node4(NodePtr(header_ptr.cast::<InnerNode4>())),
            NodeType::Node16 => ConcreteNodePtr::Node16(NodePtr(header_ptr.cast::<InnerNode16>())),
            NodeType::Node48 => ConcreteNodePtr::Node48(NodePtr(header_ptr.cast::<InnerNode48>())),
            NodeType::Node256 => {
                ConcreteNodePtr::Node256(NodePtr(header_ptr.cast::<InnerNode256>()))
            },
        }
    }

    /// Get a shared reference to the header of the pointed-to inner node, or
    /// `None` for a tagged leaf.
    ///
    /// # Safety
    ///
    ///  - The returned reference has an unbounded lifetime; the caller must
    ///    ensure the node is not mutated or deallocated while it lives.
    pub(crate) unsafe fn header_ref<'h>(self) -> Option<&'h Header> {
        // SAFETY: Validity of the allocation is guaranteed by construction of
        // the non-leaf variants of this type; aliasing is covered by the
        // caller requirements.
        self.0.to_ptr().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Get a mutable reference to the header of the pointed-to inner node, or
    /// `None` for a tagged leaf.
    ///
    /// # Safety
    ///
    ///  - The returned reference has an unbounded lifetime; the caller must
    ///    ensure no other reference into the node exists while it lives.
    pub(crate) unsafe fn header_mut<'h>(self) -> Option<&'h mut Header> {
        // SAFETY: Validity of the allocation is guaranteed by construction of
        // the non-leaf variants of this type; uniqueness is covered by the
        // caller requirements.
        self.0.to_ptr().map(|mut ptr| unsafe { ptr.as_mut() })
    }
}

/// An enum that encapsulates pointers to every concrete node type, with
/// tagged leaves resolved to their value.
#[derive(Debug, Clone, Copy)]
pub enum ConcreteNodePtr {
    /// Node that references between 2 and 4 children
    Node4(NodePtr<InnerNode4>),
    /// Node that references between 5 and 16 children
    Node16(NodePtr<InnerNode16>),
    /// Node that references between 17 and 48 children
    Node48(NodePtr<InnerNode48>),
    /// Node that references between 49 and 256 children
    Node256(NodePtr<InnerNode256>),
    /// A tagged leaf holding the stored value
    Leaf(usize),
}

/// A typed pointer to an inner node.
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq)]
pub struct NodePtr<N>(NonNull<N>);

impl<N: InnerNode> NodePtr<N> {
    /// Move the given node onto the heap and return a pointer to it.
    pub fn allocate_node(node: N) -> Self {
        // SAFETY: The pointer from `Box::into_raw` is non-null, aligned, and
        // valid for reads and writes of `N`.
        NodePtr(unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(node))) })
    }

    /// Deallocate the node object created with [`NodePtr::allocate_node`].
    ///
    /// # Safety
    ///
    ///  - This function can only be called when there is a single remaining
    ///    pointer to the object, and only once for a given node.
    pub unsafe fn deallocate_node(node: Self) {
        // SAFETY: Covered by the safety conditions of this function.
        drop(unsafe { Box::from_raw(node.0.as_ptr()) });
    }

    /// Cast this node pointer back to an opaque reference, losing type
    /// information.
    pub fn to_opaque(self) -> OpaqueNodePtr {
        // The cast is valid because every inner node type is `repr(C)` with
        // the `Header` as its first field. The header alignment keeps the tag
        // bit of the resulting word clear.
        OpaqueNodePtr(TaggedPointer::from_ptr(self.0.cast::<Header>()))
    }

    /// Get a shared reference to the pointed-to node.
    ///
    /// # Safety
    ///
    ///  - The returned reference has an unbounded lifetime; the caller must
    ///    ensure the node is not mutated or deallocated while it lives.
    pub unsafe fn as_ref<'a>(self) -> &'a N {
        // SAFETY: The pointer is valid by construction; aliasing is covered
        // by the caller requirements.
        unsafe { self.0.as_ref() }
    }

    /// Get a mutable reference to the pointed-to node.
    ///
    /// # Safety
    ///
    ///  - The returned reference has an unbounded lifetime; the caller must
    ///    ensure no other reference into the node exists while it lives.
    pub unsafe fn as_mut<'a>(mut self) -> &'a mut N {
        // SAFETY: The pointer is valid by construction; uniqueness is covered
        // by the caller requirements.
        unsafe { self.0.as_mut() }
    }
}

impl<N> Clone for NodePtr<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for NodePtr<N> {}

/// Operations common to the four inner node layouts.
pub trait InnerNode: Copy {
    /// The runtime type tag of this layout.
    const TYPE: NodeType;

    /// The next-larger layout, used when this node overflows on insert.
    type GrownNode: InnerNode;

    /// The next-smaller layout, used when this node underflows on erase.
    type ShrunkenNode: InnerNode;

    /// Create an empty node from the given header.
    ///
    /// The header's node type is overridden to match this layout.
    fn from_header(header: Header) -> Self;

    /// Access the common header.
    fn header(&self) -> &Header;

    /// Mutably access the common header.
    fn header_mut(&mut self) -> &mut Header;

    /// Search for the child that corresponds to the given key fragment.
    fn lookup_child(&self, key_fragment: u8) -> Option<OpaqueNodePtr>;

    /// Write a new child for a key fragment that is not yet present.
    ///
    /// # Panics
    ///
    ///  - Panics if the node is already at capacity.
    fn write_child(&mut self, key_fragment: u8, child: OpaqueNodePtr);

    /// Replace the child of a key fragment that is already present.
    ///
    /// # Panics
    ///
    ///  - Panics if the key fragment has no child in this node.
    fn overwrite_child(&mut self, key_fragment: u8, child: OpaqueNodePtr);

    /// Remove the child for the given key fragment, returning it if present.
    fn remove_child(&mut self, key_fragment: u8) -> Option<OpaqueNodePtr>;

    /// Copy this node into the next-larger layout.
    fn grow(&self) -> Self::GrownNode;

    /// Copy this node into the next-smaller layout.
    ///
    /// # Panics
    ///
    ///  - Panics if the children do not fit in the smaller layout.
    fn shrink(&self) -> Self::ShrunkenNode;

    /// Return the key fragment and child with the smallest key fragment.
    ///
    /// # Panics
    ///
    ///  - Panics if the node has no children.
    fn min(&self) -> (u8, OpaqueNodePtr);

    /// Return the key fragment and child with the largest key fragment.
    ///
    /// # Panics
    ///
    ///  - Panics if the node has no children.
    fn max(&self) -> (u8, OpaqueNodePtr);

    /// Iterate over all `(key fragment, child)` pairs in ascending key
    /// fragment order.
    fn iter(&self) -> impl Iterator<Item = (u8, OpaqueNodePtr)> + '_;

    /// Return true if this node is at the capacity of its layout.
    fn is_full(&self) -> bool {
        self.header().is_full()
    }
}

/// Search the first `num_children` sign-flipped keys for an exact match.
#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
fn node16_find_key(keys: &[u8; 16], flipped_fragment: u8, num_children: usize) -> Option<usize> {
    use std::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    // SAFETY: `keys` is a fully initialized 16 byte array, so the unaligned
    // 128-bit load stays in bounds. The mask below discards any lanes past
    // `num_children`.
    let bitfield = unsafe {
        let cmp = _mm_cmpeq_epi8(
            _mm_set1_epi8(flipped_fragment as i8),
            _mm_loadu_si128(keys.as_ptr() as *const __m128i),
        );
        _mm_movemask_epi8(cmp) & ((1 << num_children) - 1)
    };

    (bitfield != 0).then(|| bitfield.trailing_zeros() as usize)
}

/// Search the first `num_children` sign-flipped keys for an exact match.
#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
fn node16_find_key(keys: &[u8; 16], flipped_fragment: u8, num_children: usize) -> Option<usize> {
    keys[..num_children]
        .iter()
        .position(|key| *key == flipped_fragment)
}

/// Find the position where a sign-flipped key fragment must be inserted to
/// keep the first `num_children` keys sorted.
#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
fn node16_find_insert_position(
    keys: &[u8; 16],
    flipped_fragment: u8,
    num_children: usize,
) -> usize {
    use std::arch::x86_64::{
        __m128i, _mm_cmplt_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    // SAFETY: `keys` is a fully initialized 16 byte array, so the unaligned
    // 128-bit load stays in bounds. The signed less-than over sign-flipped
    // bytes implements the unsigned order of the original fragments.
    let bitfield = unsafe {
        let cmp = _mm_cmplt_epi8(
            _mm_set1_epi8(flipped_fragment as i8),
            _mm_loadu_si128(keys.as_ptr() as *const __m128i),
        );
        _mm_movemask_epi8(cmp) & ((1 << num_children) - 1)
    };

    if bitfield != 0 {
        bitfield.trailing_zeros() as usize
    } else {
        num_children
    }
}

/// Find the position where a sign-flipped key fragment must be inserted to
/// keep the first `num_children` keys sorted.
#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
fn node16_find_insert_position(
    keys: &[u8; 16],
    flipped_fragment: u8,
    num_children: usize,
) -> usize {
    keys[..num_children]
        .iter()
        .position(|key| (*key as i8) > (flipped_fragment as i8))
        .unwrap_or(num_children)
}

/// Node that references between 2 and 4 children.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct InnerNode4 {
    /// The common node fields.
    pub header: Header,
    /// The key fragments of the children, in ascending order. Only the first
    /// `header.num_children()` entries are populated.
    pub keys: [u8; 4],
    /// The children matching `keys` by index.
    ///
    /// This array will only be initialized for the first
    /// `header.num_children()` values.
    pub child_pointers: [MaybeUninit<OpaqueNodePtr>; 4],
}

impl fmt::Debug for InnerNode4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (keys, child_pointers) = self.initialized_portion();
        f.debug_struct("InnerNode4")
            .field("header", &self.header)
            .field("keys", &keys)
            .field("child_pointers", &child_pointers)
            .finish()
    }
}

impl InnerNode4 {
    /// Create an empty `InnerNode4`.
    pub fn empty() -> Self {
        Self::from_header(Header::empty(NodeType::Node4))
    }

    /// Return the populated portions of the key and child pointer arrays.
    pub fn initialized_portion(&self) -> (&[u8], &[OpaqueNodePtr]) {
        let num_children = self.header.num_children();
        // SAFETY: The array prefix with length `header.num_children()` is
        // kept initialized by the insert/remove shifting.
        unsafe {
            (
                &self.keys[..num_children],
                maybe_uninit_slice_assume_init_ref(&self.child_pointers[..num_children]),
            )
        }
    }
}

impl InnerNode for InnerNode4 {
    const TYPE: NodeType = NodeType::Node4;

    type GrownNode = InnerNode16;
    type ShrunkenNode = Self;

    fn from_header(header: Header) -> Self {
        InnerNode4 {
            header: header.clone_for_type(NodeType::Node4),
            keys: [0; 4],
            child_pointers: [MaybeUninit::uninit(); 4],
        }
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn lookup_child(&self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let (keys, child_pointers) = self.initialized_portion();
        keys.iter()
            .position(|key| *key == key_fragment)
            .map(|child_index| child_pointers[child_index])
    }

    fn write_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let num_children = self.header.num_children();
        assert!(num_children < 4, "cannot write a child into a full node");

        let child_index = self.keys[..num_children]
            .iter()
            .position(|key| *key > key_fragment)
            .unwrap_or(num_children);
        self.keys
            .copy_within(child_index..num_children, child_index + 1);
        self.child_pointers
            .copy_within(child_index..num_children, child_index + 1);
        self.keys[child_index] = key_fragment;
        self.child_pointers[child_index].write(child);
        self.header.inc_num_children();
    }

    fn overwrite_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let num_children = self.header.num_children();
        let child_index = self.keys[..num_children]
            .iter()
            .position(|key| *key == key_fragment)
            .expect("given key fragment is not present in the node");
        self.child_pointers[child_index].write(child);
    }

    fn remove_child(&mut self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let num_children = self.header.num_children();
        let child_index = self.keys[..num_children]
            .iter()
            .position(|key| *key == key_fragment)?;
        // SAFETY: The position search is limited to the initialized portion.
        let removed = unsafe { self.child_pointers[child_index].assume_init() };
        self.keys.copy_within((child_index + 1)..num_children, child_index);
        self.child_pointers
            .copy_within((child_index + 1)..num_children, child_index);
        self.header.dec_num_children();
        Some(removed)
    }

    fn grow(&self) -> InnerNode16 {
        let num_children = self.header.num_children();
        let mut keys = [0; 16];
        let mut child_pointers = [MaybeUninit::uninit(); 16];

        for (index, key) in self.keys[..num_children].iter().enumerate() {
            keys[index] = flip_sign(*key);
        }
        child_pointers[..num_children].copy_from_slice(&self.child_pointers[..num_children]);

        InnerNode16 {
            header: self.header.clone_for_type(NodeType::Node16),
            keys,
            child_pointers,
        }
    }

    fn shrink(&self) -> Self {
        unreachable!("an InnerNode4 cannot shrink, it collapses into its remaining child")
    }

    fn min(&self) -> (u8, OpaqueNodePtr) {
        let (keys, child_pointers) = self.initialized_portion();
        (keys[0], child_pointers[0])
    }

    fn max(&self) -> (u8, OpaqueNodePtr) {
        let (keys, child_pointers) = self.initialized_portion();
        (keys[keys.len() - 1], child_pointers[child_pointers.len() - 1])
    }

    fn iter(&self) -> impl Iterator<Item = (u8, OpaqueNodePtr)> + '_ {
        let (keys, child_pointers) = self.initialized_portion();
        keys.iter().copied().zip(child_pointers.iter().copied())
    }
}

/// Node that references between 5 and 16 children.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct InnerNode16 {
    /// The common node fields.
    pub header: Header,
    /// The key fragments of the children, stored sign-flipped and in
    /// ascending signed order. Only the first `header.num_children()` entries
    /// are populated; the rest are zero so that full-width SIMD loads read
    /// initialized memory.
    pub keys: [u8; 16],
    /// The children matching `keys` by index.
    ///
    /// This array will only be initialized for the first
    /// `header.num_children()` values.
    pub child_pointers: [MaybeUninit<OpaqueNodePtr>; 16],
}

impl fmt::Debug for InnerNode16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (keys, child_pointers) = self.initialized_portion();
        f.debug_struct("InnerNode16")
            .field("header", &self.header)
            .field("keys", &keys)
            .field("child_pointers", &child_pointers)
            .finish()
    }
}

impl InnerNode16 {
    /// Create an empty `InnerNode16`.
    pub fn empty() -> Self {
        Self::from_header(Header::empty(NodeType::Node16))
    }

    /// Return the populated portions of the key and child pointer arrays.
    ///
    /// The returned keys are in the sign-flipped storage form.
    pub fn initialized_portion(&self) -> (&[u8], &[OpaqueNodePtr]) {
        let num_children = self.header.num_children();
        // SAFETY: The array prefix with length `header.num_children()` is
        // kept initialized by the insert/remove shifting.
        unsafe {
            (
                &self.keys[..num_children],
                maybe_uninit_slice_assume_init_ref(&self.child_pointers[..num_children]),
            )
        }
    }
}

impl InnerNode for InnerNode16 {
    const TYPE: NodeType = NodeType::Node16;

    type GrownNode = InnerNode48;
    type ShrunkenNode = InnerNode4;

    fn from_header(header: Header) -> Self {
        InnerNode16 {
            header: header.clone_for_type(NodeType::Node16),
            keys: [0; 16],
            child_pointers: [MaybeUninit::uninit(); 16],
        }
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn lookup_child(&self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let num_children = self.header.num_children();
        let child_index = node16_find_key(&self.keys, flip_sign(key_fragment), num_children)?;
        // SAFETY: The byte search is masked to the initialized portion.
        Some(unsafe { self.child_pointers[child_index].assume_init() })
    }

    fn write_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let num_children = self.header.num_children();
        assert!(num_children < 16, "cannot write a child into a full node");

        let flipped_fragment = flip_sign(key_fragment);
        let child_index = node16_find_insert_position(&self.keys, flipped_fragment, num_children);
        self.keys
            .copy_within(child_index..num_children, child_index + 1);
        self.child_pointers
            .copy_within(child_index..num_children, child_index + 1);
        self.keys[child_index] = flipped_fragment;
        self.child_pointers[child_index].write(child);
        self.header.inc_num_children();
    }

    fn overwrite_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let num_children = self.header.num_children();
        let child_index = node16_find_key(&self.keys, flip_sign(key_fragment), num_children)
            .expect("given key fragment is not present in the node");
        self.child_pointers[child_index].write(child);
    }

    fn remove_child(&mut self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let num_children = self.header.num_children();
        let child_index = node16_find_key(&self.keys, flip_sign(key_fragment), num_children)?;
        // SAFETY: The byte search is masked to the initialized portion.
        let removed = unsafe { self.child_pointers[child_index].assume_init() };
        self.keys.copy_within((child_index + 1)..num_children, child_index);
        self.child_pointers
            .copy_within((child_index + 1)..num_children, child_index);
        // Clear the tail so full-width SIMD loads keep reading initialized,
        // deterministic bytes.
        self.keys[num_children - 1] = 0;
        self.header.dec_num_children();
        Some(removed)
    }

    fn grow(&self) -> InnerNode48 {
        let num_children = self.header.num_children();
        let mut child_indices = [RestrictedNodeIndex::<48>::EMPTY; 256];
        let mut child_pointers = [None; 48];

        for (index, flipped_key) in self.keys[..num_children].iter().enumerate() {
            // PANIC SAFETY: `index` is at most 15, well below the node 48
            // index limit.
            child_indices[usize::from(flip_sign(*flipped_key))] =
                RestrictedNodeIndex::try_from(index).unwrap();
        }
        let (_, initialized_pointers) = self.initialized_portion();
        for (index, child) in initialized_pointers.iter().enumerate() {
            child_pointers[index] = Some(*child);
        }

        InnerNode48 {
            header: self.header.clone_for_type(NodeType::Node48),
            child_indices,
            child_pointers,
        }
    }

    fn shrink(&self) -> InnerNode4 {
        let num_children = self.header.num_children();
        assert!(
            num_children <= 4,
            "cannot shrink a node with more than 4 children"
        );

        let mut keys = [0; 4];
        let mut child_pointers = [MaybeUninit::uninit(); 4];
        for (index, flipped_key) in self.keys[..num_children].iter().enumerate() {
            keys[index] = flip_sign(*flipped_key);
        }
        child_pointers[..num_children].copy_from_slice(&self.child_pointers[..num_children]);

        InnerNode4 {
            header: self.header.clone_for_type(NodeType::Node4),
            keys,
            child_pointers,
        }
    }

    fn min(&self) -> (u8, OpaqueNodePtr) {
        let (keys, child_pointers) = self.initialized_portion();
        (flip_sign(keys[0]), child_pointers[0])
    }

    fn max(&self) -> (u8, OpaqueNodePtr) {
        let (keys, child_pointers) = self.initialized_portion();
        (
            flip_sign(keys[keys.len() - 1]),
            child_pointers[child_pointers.len() - 1],
        )
    }

    fn iter(&self) -> impl Iterator<Item = (u8, OpaqueNodePtr)> + '_ {
        let (keys, child_pointers) = self.initialized_portion();
        keys.iter()
            .map(|flipped_key| flip_sign(*flipped_key))
            .zip(child_pointers.iter().copied())
    }
}

/// A restricted index only valid from 0 to `LIMIT - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct RestrictedNodeIndex<const LIMIT: u8>(u8);

impl<const LIMIT: u8> RestrictedNodeIndex<LIMIT> {
    /// A placeholder index value that indicates that the index is not
    /// occupied.
    pub const EMPTY: Self = RestrictedNodeIndex(LIMIT);
}

impl<const LIMIT: u8> From<RestrictedNodeIndex<LIMIT>> for u8 {
    fn from(src: RestrictedNodeIndex<LIMIT>) -> Self {
        src.0
    }
}

impl<const LIMIT: u8> TryFrom<usize> for RestrictedNodeIndex<LIMIT> {
    type Error = TryFromByteError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < usize::from(LIMIT) {
            Ok(RestrictedNodeIndex(value as u8))
        } else {
            Err(TryFromByteError(LIMIT, value))
        }
    }
}

/// The error type returned when attempting to construct an index outside the
/// accepted range of a [`RestrictedNodeIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFromByteError(u8, usize);

impl fmt::Display for TryFromByteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Input value [{}] is greater than the allowed maximum [{}] for RestrictedNodeIndex.",
            self.1, self.0
        )
    }
}

impl Error for TryFromByteError {}

/// Node that references between 17 and 48 children.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct InnerNode48 {
    /// The common node fields.
    pub header: Header,
    /// An array that maps key fragments (as the index) to the index of the
    /// child in the `child_pointers` array.
    ///
    /// Entries hold [`RestrictedNodeIndex::EMPTY`] when the key fragment has
    /// no child.
    pub child_indices: [RestrictedNodeIndex<48>; 256],
    /// The children of this node. A slot is `None` when no `child_indices`
    /// entry refers to it.
    pub child_pointers: [Option<OpaqueNodePtr>; 48],
}

impl fmt::Debug for InnerNode48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerNode48")
            .field("header", &self.header)
            .field("children", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl InnerNode48 {
    /// Create an empty `InnerNode48`.
    pub fn empty() -> Self {
        Self::from_header(Header::empty(NodeType::Node48))
    }
}

impl InnerNode for InnerNode48 {
    const TYPE: NodeType = NodeType::Node48;

    type GrownNode = InnerNode256;
    type ShrunkenNode = InnerNode16;

    fn from_header(header: Header) -> Self {
        InnerNode48 {
            header: header.clone_for_type(NodeType::Node48),
            child_indices: [RestrictedNodeIndex::EMPTY; 256],
            child_pointers: [None; 48],
        }
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn lookup_child(&self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let index = self.child_indices[usize::from(key_fragment)];
        if index == RestrictedNodeIndex::EMPTY {
            return None;
        }
        self.child_pointers[usize::from(u8::from(index))]
    }

    fn write_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let num_children = self.header.num_children();
        assert!(num_children < 48, "cannot write a child into a full node");

        // The slot matching the child count is free unless an earlier remove
        // left a hole there; in that case scan for the hole.
        let mut child_index = num_children;
        if self.child_pointers[child_index].is_some() {
            // PANIC SAFETY: `num_children < 48` guarantees at least one free
            // slot exists.
            child_index = self
                .child_pointers
                .iter()
                .position(Option::is_none)
                .unwrap();
        }

        self.child_pointers[child_index] = Some(child);
        // PANIC SAFETY: `child_index` indexes an array of length 48, and the
        // full-node case is rejected above.
        self.child_indices[usize::from(key_fragment)] =
            RestrictedNodeIndex::try_from(child_index).unwrap();
        self.header.inc_num_children();
    }

    fn overwrite_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        let index = self.child_indices[usize::from(key_fragment)];
        assert!(
            index != RestrictedNodeIndex::EMPTY,
            "given key fragment is not present in the node"
        );
        self.child_pointers[usize::from(u8::from(index))] = Some(child);
    }

    fn remove_child(&mut self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let index = self.child_indices[usize::from(key_fragment)];
        if index == RestrictedNodeIndex::EMPTY {
            return None;
        }
        let removed = self.child_pointers[usize::from(u8::from(index))].take();
        self.child_indices[usize::from(key_fragment)] = RestrictedNodeIndex::EMPTY;
        self.header.dec_num_children();
        removed
    }

    fn grow(&self) -> InnerNode256 {
        let mut child_pointers = [None; 256];
        for (key_fragment, child) in self.iter() {
            child_pointers[usize::from(key_fragment)] = Some(child);
        }

        InnerNode256 {
            header: self.header.clone_for_type(NodeType::Node256),
            child_pointers,
        }
    }

    fn shrink(&self) -> InnerNode16 {
        let num_children = self.header.num_children();
        assert!(
            num_children <= 16,
            "cannot shrink a node with more than 16 children"
        );

        let mut keys = [0; 16];
        let mut child_pointers = [MaybeUninit::uninit(); 16];
        // Iterating the key fragments in ascending unsigned order produces
        // the sign-flipped keys already in ascending signed order.
        for (index, (key_fragment, child)) in self.iter().enumerate() {
            keys[index] = flip_sign(key_fragment);
            child_pointers[index].write(child);
        }

        InnerNode16 {
            header: self.header.clone_for_type(NodeType::Node16),
            keys,
            child_pointers,
        }
    }

    fn min(&self) -> (u8, OpaqueNodePtr) {
        self.iter()
            .next()
            .expect("an inner node must always have at least one child")
    }

    fn max(&self) -> (u8, OpaqueNodePtr) {
        self.iter()
            .last()
            .expect("an inner node must always have at least one child")
    }

    fn iter(&self) -> impl Iterator<Item = (u8, OpaqueNodePtr)> + '_ {
        let child_pointers = &self.child_pointers;
        self.child_indices
            .iter()
            .enumerate()
            .filter(|(_, index)| **index != RestrictedNodeIndex::EMPTY)
            .map(move |(key_fragment, index)| {
                (
                    // PANIC SAFETY: `child_indices` has length 256, so the
                    // enumerated position always fits in a byte. The pointer
                    // slot is populated for every non-empty index entry.
                    u8::try_from(key_fragment).unwrap(),
                    child_pointers[usize::from(u8::from(*index))].unwrap(),
                )
            })
    }
}

/// Node that references between 49 and 256 children.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct InnerNode256 {
    /// The common node fields.
    pub header: Header,
    /// An array that directly maps a key fragment (as index) to a child.
    pub child_pointers: [Option<OpaqueNodePtr>; 256],
}

impl fmt::Debug for InnerNode256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerNode256")
            .field("header", &self.header)
            .field("children", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl InnerNode256 {
    /// Create an empty `InnerNode256`.
    pub fn empty() -> Self {
        Self::from_header(Header::empty(NodeType::Node256))
    }
}

impl InnerNode for InnerNode256 {
    const TYPE: NodeType = NodeType::Node256;

    type GrownNode = Self;
    type ShrunkenNode = InnerNode48;

    fn from_header(header: Header) -> Self {
        InnerNode256 {
            header: header.clone_for_type(NodeType::Node256),
            child_pointers: [None; 256],
        }
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn lookup_child(&self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        self.child_pointers[usize::from(key_fragment)]
    }

    fn write_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        debug_assert!(
            self.child_pointers[usize::from(key_fragment)].is_none(),
            "key fragment already has a child, use overwrite_child"
        );
        self.child_pointers[usize::from(key_fragment)] = Some(child);
        self.header.inc_num_children();
    }

    fn overwrite_child(&mut self, key_fragment: u8, child: OpaqueNodePtr) {
        assert!(
            self.child_pointers[usize::from(key_fragment)].is_some(),
            "given key fragment is not present in the node"
        );
        self.child_pointers[usize::from(key_fragment)] = Some(child);
    }

    fn remove_child(&mut self, key_fragment: u8) -> Option<OpaqueNodePtr> {
        let removed = self.child_pointers[usize::from(key_fragment)].take()?;
        self.header.dec_num_children();
        Some(removed)
    }

    fn grow(&self) -> Self {
        unreachable!("an InnerNode256 has no larger representation to grow into")
    }

    fn shrink(&self) -> InnerNode48 {
        let num_children = self.header.num_children();
        assert!(
            num_children <= 48,
            "cannot shrink a node with more than 48 children"
        );

        let mut child_indices = [RestrictedNodeIndex::EMPTY; 256];
        let mut child_pointers = [None; 48];
        for (index, (key_fragment, child)) in self.iter().enumerate() {
            // PANIC SAFETY: `index` is bounded by `num_children <= 48`,
            // checked above.
            child_indices[usize::from(key_fragment)] =
                RestrictedNodeIndex::try_from(index).unwrap();
            child_pointers[index] = Some(child);
        }

        InnerNode48 {
            header: self.header.clone_for_type(NodeType::Node48),
            child_indices,
            child_pointers,
        }
    }

    fn min(&self) -> (u8, OpaqueNodePtr) {
        self.iter()
            .next()
            .expect("an inner node must always have at least one child")
    }

    fn max(&self) -> (u8, OpaqueNodePtr) {
        self.iter()
            .last()
            .expect("an inner node must always have at least one child")
    }

    fn iter(&self) -> impl Iterator<Item = (u8, OpaqueNodePtr)> + '_ {
        self.child_pointers
            .iter()
            .enumerate()
            .filter_map(|(key_fragment, child_pointer)| {
                child_pointer.map(|child_pointer| {
                    (
                        // PANIC SAFETY: `child_pointers` has length 256, so
                        // the enumerated position always fits in a byte.
                        u8::try_from(key_fragment).unwrap(),
                        child_pointer,
                    )
                })
            })
    }
}
