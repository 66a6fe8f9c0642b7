//! The safe index wrapper that owns the tree root.

use std::fmt;

use crate::{
    deallocate_tree, delete_unchecked, insert_unchecked, maximum_unchecked, minimum_unchecked,
    search_pessimistic_unchecked, search_unchecked, InsertPrefixError, KeySource, OpaqueNodePtr,
};

/// An ordered index over fixed-width binary keys, based on an adaptive radix
/// tree.
///
/// The index maps each key to an opaque integer value. Values are packed
/// directly into tagged node references, so a value must fit in
/// [`OpaqueNodePtr::MAX_LEAF_VALUE`]. The key bytes of any stored value must
/// be reproducible through the index's [`KeySource`]; the index consults the
/// source whenever a descent has to verify bytes that are not stored in node
/// prefixes.
///
/// # Examples
///
/// ```rust
/// use tart::{ArtIndex, BigEndianU64};
///
/// let mut index = ArtIndex::new(BigEndianU64);
///
/// index.insert(&42u64.to_be_bytes(), 42).unwrap();
/// index.insert(&7u64.to_be_bytes(), 7).unwrap();
///
/// assert_eq!(index.get(&42u64.to_be_bytes()), Some(42));
/// assert_eq!(index.get(&13u64.to_be_bytes()), None);
/// assert_eq!(index.minimum(), Some(7));
/// assert_eq!(index.maximum(), Some(42));
///
/// assert_eq!(index.remove(&7u64.to_be_bytes()), Some(7));
/// assert_eq!(index.len(), 1);
/// ```
pub struct ArtIndex<S: KeySource> {
    /// The number of entries present in the tree.
    num_entries: usize,
    /// A pointer to the tree root, if present.
    pub(crate) root: Option<OpaqueNodePtr>,
    /// The hook used to reconstruct key bytes from stored values.
    source: S,
}

impl<S: KeySource> ArtIndex<S> {
    /// Create a new, empty index using the given key source.
    pub fn new(source: S) -> Self {
        ArtIndex {
            num_entries: 0,
            root: None,
            source,
        }
    }

    /// Access the key source of this index.
    pub fn key_source(&self) -> &S {
        &self.source
    }

    /// Return the number of entries in the index.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Return true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Look up the value stored with the given key, using the optimistic
    /// descent.
    pub fn get(&self, key: &[u8]) -> Option<usize> {
        let root = self.root?;

        // SAFETY: The shared borrow on `self` excludes any concurrent
        // mutation of the tree for the duration of the search.
        unsafe { search_unchecked(root, key, &self.source) }
    }

    /// Look up the value stored with the given key, verifying every
    /// compressed path byte for byte.
    ///
    /// Observably equivalent to [`ArtIndex::get`]; exposed so that the two
    /// descent strategies can be checked against each other.
    pub fn get_pessimistic(&self, key: &[u8]) -> Option<usize> {
        let root = self.root?;

        // SAFETY: The shared borrow on `self` excludes any concurrent
        // mutation of the tree for the duration of the search.
        unsafe { search_pessimistic_unchecked(root, key, &self.source) }
    }

    /// Insert the given key-value pair into the index.
    ///
    /// `key` must be exactly the byte string that the index's [`KeySource`]
    /// reconstructs for `value`. If the key is already present, its value is
    /// replaced and the old value returned.
    ///
    /// # Errors
    ///
    ///  - Returns an [`InsertPrefixError`] if the given key is a prefix of an
    ///    existing key or vice versa; impossible when all keys have the same
    ///    width.
    ///
    /// # Panics
    ///
    ///  - Panics if `value` is larger than [`OpaqueNodePtr::MAX_LEAF_VALUE`].
    pub fn insert(&mut self, key: &[u8], value: usize) -> Result<Option<usize>, InsertPrefixError> {
        debug_assert_eq!(
            self.source.load_key(value).as_ref(),
            key,
            "the inserted key must round-trip through the key source"
        );

        let Some(root) = self.root else {
            self.root = Some(OpaqueNodePtr::make_leaf(value));
            self.num_entries = 1;
            return Ok(None);
        };

        // SAFETY: The mutable borrow on `self` makes this the only live
        // access to the tree, and the root is the unique entry point into it.
        let insert_result = unsafe { insert_unchecked(root, key, value, &self.source)? };

        self.root = Some(insert_result.new_root);
        if insert_result.existing_value.is_none() {
            self.num_entries += 1;
        }

        Ok(insert_result.existing_value)
    }

    /// Remove the entry for the given key, returning its value if present.
    pub fn remove(&mut self, key: &[u8]) -> Option<usize> {
        let root = self.root?;

        // SAFETY: The mutable borrow on `self` makes this the only live
        // access to the tree, and the root is the unique entry point into it.
        let delete_result = unsafe { delete_unchecked(root, key, &self.source)? };

        self.root = delete_result.new_root;
        self.num_entries -= 1;

        Some(delete_result.deleted_value)
    }

    /// Return the value whose key is the smallest in the index, or `None` if
    /// the index is empty.
    pub fn minimum(&self) -> Option<usize> {
        let root = self.root?;

        // SAFETY: The shared borrow on `self` excludes any concurrent
        // mutation of the tree for the duration of the search.
        Some(unsafe { minimum_unchecked(root) })
    }

    /// Return the value whose key is the largest in the index, or `None` if
    /// the index is empty.
    pub fn maximum(&self) -> Option<usize> {
        let root = self.root?;

        // SAFETY: The shared borrow on `self` excludes any concurrent
        // mutation of the tree for the duration of the search.
        Some(unsafe { maximum_unchecked(root) })
    }
}

impl<S: KeySource> Drop for ArtIndex<S> {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            // SAFETY: `self` owns the tree exclusively and is being dropped,
            // so no pointer into the tree survives this call.
            unsafe { deallocate_tree(root) };
        }
        self.num_entries = 0;
    }
}

impl<S: KeySource + Default> Default for ArtIndex<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: KeySource> fmt::Debug for ArtIndex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtIndex")
            .field("len", &self.num_entries)
            .finish_non_exhaustive()
    }
}

// SAFETY: The tree is owned exclusively through the root pointer; every node
// is reachable from exactly one parent slot and mutation requires `&mut
// self`. Sending the index to another thread moves that exclusive ownership
// wholesale.
unsafe impl<S: KeySource + Send> Send for ArtIndex<S> {}

// SAFETY: All operations available through `&ArtIndex` only read the tree,
// and reads cannot race with mutation because mutation requires `&mut self`.
unsafe impl<S: KeySource + Sync> Sync for ArtIndex<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BigEndianU64;

    fn be(key: u64) -> [u8; 8] {
        key.to_be_bytes()
    }

    #[test]
    fn empty_index() {
        let index = ArtIndex::new(BigEndianU64);

        assert!(index.is_empty());
        assert_eq!(index.get(&be(0)), None);
        assert_eq!(index.get_pessimistic(&be(0)), None);
        assert_eq!(index.minimum(), None);
        assert_eq!(index.maximum(), None);
    }

    #[test]
    fn single_leaf_hit_and_miss() {
        let mut index = ArtIndex::new(BigEndianU64);

        assert_eq!(index.insert(&be(1), 1), Ok(None));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&be(1)), Some(1));
        assert_eq!(index.get(&be(2)), None);
        assert_eq!(index.minimum(), Some(1));
        assert_eq!(index.maximum(), Some(1));

        assert_eq!(index.remove(&be(1)), Some(1));
        assert!(index.is_empty());
        assert_eq!(index.get(&be(1)), None);
    }

    #[test]
    fn duplicate_insert_replaces_value() {
        let mut table = crate::tests_common::KeyTable::new();
        let first = table.push(b"duplicated");
        let second = table.push(b"duplicated");
        let other = table.push(b"unrelated");
        let mut index = ArtIndex::new(table);

        assert_eq!(index.insert(b"duplicated", first), Ok(None));
        assert_eq!(index.insert(b"unrelated", other), Ok(None));
        assert_eq!(index.insert(b"duplicated", second), Ok(Some(first)));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(b"duplicated"), Some(second));
        assert_eq!(index.get(b"unrelated"), Some(other));
    }

    #[test]
    fn duplicate_insert_at_root_leaf() {
        let mut table = crate::tests_common::KeyTable::new();
        let first = table.push(b"same-key");
        let second = table.push(b"same-key");
        let mut index = ArtIndex::new(table);

        assert_eq!(index.insert(b"same-key", first), Ok(None));
        // The root is a bare leaf; replacing it swaps the root word itself.
        assert_eq!(index.insert(b"same-key", second), Ok(Some(first)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(b"same-key"), Some(second));
    }

    #[test]
    fn remove_absent_key_is_noop() {
        let mut index = ArtIndex::new(BigEndianU64);

        index.insert(&be(10), 10).unwrap();
        assert_eq!(index.remove(&be(11)), None);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&be(10)), Some(10));
    }
}
