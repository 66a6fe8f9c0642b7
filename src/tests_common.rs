//! Shared helpers for tests and benchmarks.

use crate::{ArtIndex, BigEndianU64, KeySource};

/// A key source backed by a table of keys, where the stored value is the
/// key's position in the table.
///
/// This mirrors the database usage of the tree, where values identify tuples
/// and the key of a tuple is looked up out-of-band. It also allows tests to
/// use keys of any width, in particular keys whose shared prefixes exceed the
/// stored prefix cap.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyTable {
    keys: Vec<Box<[u8]>>,
}

impl KeyTable {
    /// Create an empty key table.
    pub fn new() -> Self {
        KeyTable { keys: Vec::new() }
    }

    /// Create a table over the given keys.
    pub fn from_keys<'k>(keys: impl IntoIterator<Item = &'k [u8]>) -> Self {
        KeyTable {
            keys: keys.into_iter().map(Box::from).collect(),
        }
    }

    /// Add a key to the table, returning the value it must be inserted under.
    pub fn push(&mut self, key: &[u8]) -> usize {
        self.keys.push(Box::from(key));
        self.keys.len() - 1
    }

    /// Read the key registered for `value`.
    pub fn key(&self, value: usize) -> &[u8] {
        &self.keys[value]
    }

    /// The number of keys registered in the table.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Return true if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeySource for KeyTable {
    type Key = Box<[u8]>;

    fn load_key(&self, value: usize) -> Self::Key {
        self.keys[value].clone()
    }
}

/// Build an index over 64-bit keys, inserting the given values in order.
pub fn setup_index_from_values(values: impl IntoIterator<Item = u64>) -> ArtIndex<BigEndianU64> {
    let mut index = ArtIndex::new(BigEndianU64);
    for value in values {
        index
            .insert(&value.to_be_bytes(), value as usize)
            .expect("fixed-width keys cannot prefix one another");
    }
    index
}

/// Build an index over a [`KeyTable`], inserting every key in the table.
pub fn setup_index_from_table(table: KeyTable) -> ArtIndex<KeyTable> {
    let num_keys = table.len();
    let mut index = ArtIndex::new(table);
    for value in 0..num_keys {
        let key = index.key_source().load_key(value);
        index
            .insert(&key, value)
            .expect("table keys must not prefix one another");
    }
    index
}
