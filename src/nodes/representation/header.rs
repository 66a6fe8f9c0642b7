//! The header shared by all inner node layouts.

use super::NodeType;

/// The number of prefix bytes stored inline in each inner node header.
///
/// A compressed path may be logically longer than this; the bytes past the
/// cap are not stored anywhere and are reconstructed from the key of a leaf
/// below the node when an operation needs them.
pub const NUM_PREFIX_BYTES: usize = 9;

/// The common header for all inner nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Header {
    /// The logical length of the compressed path leading to this node.
    prefix_len: u32,
    /// Number of children this inner node points to.
    num_children: u16,
    /// The runtime representation of the node containing this header.
    node_type: NodeType,
    /// The first `min(prefix_len, NUM_PREFIX_BYTES)` bytes of the compressed
    /// path.
    prefix: [u8; NUM_PREFIX_BYTES],
}

impl Header {
    /// Create a new header with an empty prefix.
    pub fn empty(node_type: NodeType) -> Self {
        Header {
            prefix_len: 0,
            num_children: 0,
            node_type,
            prefix: [0; NUM_PREFIX_BYTES],
        }
    }

    /// Create a new header with the given compressed path.
    ///
    /// `prefix` holds the stored portion of the path and may be shorter than
    /// the logical `prefix_len`; at most [`NUM_PREFIX_BYTES`] of it are kept.
    pub fn new(node_type: NodeType, prefix: &[u8], prefix_len: usize) -> Self {
        let mut header = Header::empty(node_type);
        let stored_len = prefix.len().min(NUM_PREFIX_BYTES);
        header.prefix[..stored_len].copy_from_slice(&prefix[..stored_len]);
        header.prefix_len = u32::try_from(prefix_len).unwrap();
        header
    }

    /// Copy this header for a node of a different representation, as part of
    /// a grow or shrink transition.
    pub(crate) fn clone_for_type(&self, node_type: NodeType) -> Self {
        Header { node_type, ..*self }
    }

    /// The runtime representation of the node containing this header.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// The logical length of the compressed path.
    pub fn prefix_len(&self) -> usize {
        self.prefix_len as usize
    }

    /// Minimum between [`Self::prefix_len`] and [`NUM_PREFIX_BYTES`].
    pub fn capped_prefix_len(&self) -> usize {
        (self.prefix_len as usize).min(NUM_PREFIX_BYTES)
    }

    /// Read the stored portion of the prefix present in the header.
    ///
    /// `prefix_len` can be larger than `read_prefix().len()` because only
    /// [`NUM_PREFIX_BYTES`] bytes are stored.
    pub fn read_prefix(&self) -> &[u8] {
        &self.prefix[..self.capped_prefix_len()]
    }

    /// Compare the stored portion of the prefix with the start of
    /// `possible_key` and return the number of equal bytes.
    ///
    /// Bytes of the compressed path beyond [`NUM_PREFIX_BYTES`] are not
    /// represented in memory and are not considered here.
    pub fn match_prefix(&self, possible_key: &[u8]) -> usize {
        self.read_prefix()
            .iter()
            .zip(possible_key)
            .take_while(|(prefix_byte, key_byte)| prefix_byte == key_byte)
            .count()
    }

    /// Remove the specified number of bytes from the start of the prefix.
    ///
    /// # Panics
    ///
    ///  - Panics if `num_bytes` is greater than the prefix length.
    pub fn ltrim_prefix(&mut self, num_bytes: usize) {
        assert!(
            num_bytes <= self.prefix_len(),
            "cannot trim [{num_bytes}] bytes from a prefix of length [{}]",
            self.prefix_len()
        );

        let old_capped_len = self.capped_prefix_len();
        self.prefix_len -= u32::try_from(num_bytes).unwrap();
        self.prefix
            .copy_within(num_bytes.min(old_capped_len)..old_capped_len, 0);
    }

    /// Replace the compressed path with the given bytes and logical length.
    ///
    /// Used when a prefix split must refill the stored portion from a
    /// reconstructed leaf key. At most [`NUM_PREFIX_BYTES`] of `prefix` are
    /// kept.
    pub fn set_prefix(&mut self, prefix: &[u8], prefix_len: usize) {
        let stored_len = prefix.len().min(NUM_PREFIX_BYTES);
        self.prefix[..stored_len].copy_from_slice(&prefix[..stored_len]);
        self.prefix_len = u32::try_from(prefix_len).unwrap();
    }

    /// Set the length of the prefix to 0 and return a copy of the stored
    /// bytes, the logical length, and the capped length.
    pub fn clear_prefix(&mut self) -> ([u8; NUM_PREFIX_BYTES], usize, usize) {
        let prefix_len = self.prefix_len();
        let capped_len = self.capped_prefix_len();
        self.prefix_len = 0;

        (self.prefix, prefix_len, capped_len)
    }

    /// Append `new_bytes` to the stored portion of the prefix and add
    /// `new_len` to the logical length.
    ///
    /// Stored bytes past [`NUM_PREFIX_BYTES`] are silently dropped; the
    /// logical length still grows by the full `new_len`.
    pub fn push_prefix(&mut self, new_bytes: &[u8], new_len: usize) {
        let begin = self.capped_prefix_len();
        let end = (begin + new_bytes.len()).min(NUM_PREFIX_BYTES);
        self.prefix[begin..end].copy_from_slice(&new_bytes[..end - begin]);
        self.prefix_len += u32::try_from(new_len).unwrap();
    }

    /// Return the number of children of the node containing this header.
    pub fn num_children(&self) -> usize {
        usize::from(self.num_children)
    }

    /// Return true if the node containing this header is at the capacity of
    /// its representation.
    pub fn is_full(&self) -> bool {
        self.num_children() >= self.node_type.upper_capacity()
    }

    pub(crate) fn inc_num_children(&mut self) {
        self.num_children += 1;
    }

    pub(crate) fn dec_num_children(&mut self) {
        self.num_children -= 1;
    }
}
