use crate::{
    minimum_unchecked, ConcreteNodePtr, InnerNode, KeySource, OpaqueNodePtr, NUM_PREFIX_BYTES,
};

/// Compare the full compressed path of `inner_node` against `key` starting at
/// `current_depth`, and return the number of matching bytes.
///
/// If the logical prefix is longer than the stored cap, the missing bytes are
/// reconstructed from the key of the subtree's minimum leaf. The return value
/// equals the node's prefix length iff the entire prefix matched.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `inner_node` or any of its children.
pub(crate) unsafe fn match_full_prefix<N, S>(
    inner_node: &N,
    key: &[u8],
    current_depth: usize,
    source: &S,
) -> usize
where
    N: InnerNode,
    S: KeySource,
{
    let header = inner_node.header();
    let prefix_len = header.prefix_len();
    let key_rest = &key[current_depth.min(key.len())..];

    let matched_bytes = header.match_prefix(key_rest);
    if matched_bytes < header.capped_prefix_len() || prefix_len <= NUM_PREFIX_BYTES {
        return matched_bytes;
    }

    // The stored portion matched and the logical prefix continues past it.
    // Reconstruct the missing bytes from the minimum leaf below this node;
    // its key shares the entire compressed path.
    let (_, min_child) = inner_node.min();
    // SAFETY: No concurrent mutation, guaranteed by the caller requirements.
    let min_value = unsafe { minimum_unchecked(min_child) };
    let min_key = source.load_key(min_value);
    let min_key = min_key.as_ref();

    let mut matched_bytes = matched_bytes;
    while matched_bytes < prefix_len {
        let key_index = current_depth + matched_bytes;
        if key_index >= key.len()
            || key_index >= min_key.len()
            || key[key_index] != min_key[key_index]
        {
            break;
        }
        matched_bytes += 1;
    }

    matched_bytes
}

/// Check whether the key stored for the leaf `value` matches `key` from
/// `current_depth` onward.
///
/// The bytes before `current_depth` were already consumed by the descent and
/// are not re-checked.
pub(crate) fn leaf_matches<S: KeySource>(
    value: usize,
    key: &[u8],
    current_depth: usize,
    source: &S,
) -> bool {
    if current_depth == key.len() {
        return true;
    }

    let leaf_key = source.load_key(value);
    let leaf_key = leaf_key.as_ref();

    leaf_key.len() == key.len() && leaf_key[current_depth..] == key[current_depth..]
}

/// For the given inner node, check the node prefix optimistically, then look
/// up the child for the key byte at the new depth.
///
/// A prefix at least as long as the stored cap is skipped without
/// verification and `skipped_prefix` is set; the caller must re-check the
/// full key once a leaf is reached.
fn check_prefix_lookup_child<N: InnerNode>(
    inner_node: &N,
    key: &[u8],
    current_depth: &mut usize,
    skipped_prefix: &mut bool,
) -> Option<OpaqueNodePtr> {
    let header = inner_node.header();
    let prefix_len = header.prefix_len();

    if prefix_len > 0 {
        if prefix_len < NUM_PREFIX_BYTES {
            let key_rest = key.get(*current_depth..)?;
            if header.match_prefix(key_rest) != prefix_len {
                return None;
            }
        } else {
            *skipped_prefix = true;
        }
        *current_depth += prefix_len;
    }

    let key_fragment = *key.get(*current_depth)?;
    let child = inner_node.lookup_child(key_fragment)?;
    *current_depth += 1;

    Some(child)
}

/// For the given inner node, verify the full node prefix (reconstructing
/// bytes past the stored cap if needed), then look up the child for the key
/// byte at the new depth.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `inner_node` or any of its children.
pub(crate) unsafe fn check_full_prefix_lookup_child<N, S>(
    inner_node: &N,
    key: &[u8],
    current_depth: &mut usize,
    source: &S,
) -> Option<OpaqueNodePtr>
where
    N: InnerNode,
    S: KeySource,
{
    let prefix_len = inner_node.header().prefix_len();
    if prefix_len > 0 {
        // SAFETY: Covered by the safety requirements of this function.
        if unsafe { match_full_prefix(inner_node, key, *current_depth, source) } != prefix_len {
            return None;
        }
        *current_depth += prefix_len;
    }

    let key_fragment = *key.get(*current_depth)?;
    let child = inner_node.lookup_child(key_fragment)?;
    *current_depth += 1;

    Some(child)
}

/// Search in the given tree for the value stored with the given key, using
/// optimistic prefix handling.
///
/// Compressed paths at least as long as the stored cap are skipped without
/// byte-wise verification; the candidate leaf's full key is reconstructed and
/// compared at the end to rule out a wrong turn.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
pub unsafe fn search_unchecked<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    source: &S,
) -> Option<usize> {
    let mut current_node = root;
    let mut current_depth = 0;
    let mut skipped_prefix = false;

    loop {
        current_node = match current_node.to_node_ptr() {
            ConcreteNodePtr::Node4(inner_ptr) => {
                // SAFETY (all inner arms): the reference does not outlive the
                // iteration and no mutation happens concurrently, enforced by
                // the requirements on `search_unchecked`.
                let inner_node = unsafe { inner_ptr.as_ref() };
                check_prefix_lookup_child(inner_node, key, &mut current_depth, &mut skipped_prefix)
            },
            ConcreteNodePtr::Node16(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                check_prefix_lookup_child(inner_node, key, &mut current_depth, &mut skipped_prefix)
            },
            ConcreteNodePtr::Node48(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                check_prefix_lookup_child(inner_node, key, &mut current_depth, &mut skipped_prefix)
            },
            ConcreteNodePtr::Node256(inner_ptr) => {
                let inner_node = unsafe { inner_ptr.as_ref() };
                check_prefix_lookup_child(inner_node, key, &mut current_depth, &mut skipped_prefix)
            },
            ConcreteNodePtr::Leaf(value) => {
                if !skipped_prefix && current_depth == key.len() {
                    // Every byte of the key was verified on the way down.
                    return Some(value);
                }

                let leaf_key = source.load_key(value);
                let leaf_key = leaf_key.as_ref();
                if leaf_key.len() != key.len() {
                    return None;
                }
                let recheck_from = if skipped_prefix {
                    0
                } else {
                    current_depth.min(key.len())
                };
                return (leaf_key[recheck_from..] == key[recheck_from..]).then_some(value);
            },
        }?;
    }
}

/// Search in the given tree for the value stored with the given key, always
/// verifying compressed paths byte for byte.
///
/// Prefix bytes past the stored cap are resolved through the key of the
/// subtree's minimum leaf. The observable behavior is identical to
/// [`search_unchecked`]; this form exists for equivalence testing.
///
/// # Safety
///
///  - This function cannot be called concurrently with any mutating operation
///    on `root` or any child node of `root`. This function will arbitrarily
///    read any child in the given tree.
pub unsafe fn search_pessimistic_unchecked<S: KeySource>(
    root: OpaqueNodePtr,
    key: &[u8],
    source: &S,
) -> Option<usize> {
    let mut current_node = root;
    let mut current_depth = 0;

    loop {
        current_node = match current_node.to_node_ptr() {
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
            ConcreteNodePtr::Leaf(value) => {
                return leaf_matches(value, key, current_depth, source).then_some(value);
            },
        }?;
    }
}
