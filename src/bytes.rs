//! Reconstruction of key bytes from stored values.

/// Types that can reconstruct the full key bytes of any value stored in the
/// tree.
///
/// The tree never stores key bytes in its leaves; a leaf is just a tagged
/// value. Whenever an operation needs key bytes that are not present in a
/// node's stored prefix — checking a candidate leaf after an optimistic
/// descent, resolving a compressed path longer than the stored cap, or
/// splitting such a path — it asks the source to load the key again.
///
/// Implementations must be pure with respect to the tree: for as long as a
/// value is present in the tree, `load_key` must keep returning the exact
/// byte string the value was inserted under.
pub trait KeySource {
    /// The byte container holding a reconstructed key.
    type Key: AsRef<[u8]>;

    /// Return the full key bytes for a previously stored `value`.
    fn load_key(&self, value: usize) -> Self::Key;
}

impl<S: KeySource> KeySource for &S {
    type Key = S::Key;

    fn load_key(&self, value: usize) -> Self::Key {
        (**self).load_key(value)
    }
}

/// Key source for 64-bit integer keys where the stored value is the key
/// itself.
///
/// The key bytes are the big-endian form of the value, so that the
/// lexicographic order of the byte strings equals the numeric order of the
/// integers. This is the canonical setup for benchmarking the tree over
/// integer data sets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BigEndianU64;

impl KeySource for BigEndianU64 {
    type Key = [u8; 8];

    fn load_key(&self, value: usize) -> Self::Key {
        (value as u64).to_be_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_byte_order_matches_numeric_order() {
        let pairs = [
            (0usize, 1usize),
            (1, 2),
            (255, 256),
            (0x0102030405060708, 0x0102030405060709),
            (7, usize::MAX >> 1),
        ];

        for (smaller, larger) in pairs {
            let smaller_bytes = BigEndianU64.load_key(smaller);
            let larger_bytes = BigEndianU64.load_key(larger);
            assert!(
                smaller_bytes < larger_bytes,
                "{smaller} must order below {larger}"
            );
        }
    }

    #[test]
    fn load_key_is_big_endian() {
        assert_eq!(BigEndianU64.load_key(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(
            BigEndianU64.load_key(0x1122334455667788),
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
    }
}
