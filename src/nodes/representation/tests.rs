use super::*;

fn leaf(value: usize) -> OpaqueNodePtr {
    OpaqueNodePtr::make_leaf(value)
}

#[test]
fn node_type_capacities_and_shrink_thresholds() {
    assert_eq!(NodeType::Node4.upper_capacity(), 4);
    assert_eq!(NodeType::Node16.upper_capacity(), 16);
    assert_eq!(NodeType::Node48.upper_capacity(), 48);
    assert_eq!(NodeType::Node256.upper_capacity(), 256);

    assert!(!NodeType::Node4.should_shrink(1));
    assert!(NodeType::Node16.should_shrink(3));
    assert!(!NodeType::Node16.should_shrink(4));
    assert!(NodeType::Node48.should_shrink(12));
    assert!(!NodeType::Node48.should_shrink(13));
    assert!(NodeType::Node256.should_shrink(37));
    assert!(!NodeType::Node256.should_shrink(38));
}

#[test]
fn tagged_leaf_round_trip() {
    for value in [0usize, 1, 255, OpaqueNodePtr::MAX_LEAF_VALUE] {
        let leaf = OpaqueNodePtr::make_leaf(value);

        assert!(leaf.is_leaf());
        assert_eq!(leaf.as_leaf_value(), Some(value));
        assert!(matches!(leaf.to_node_ptr(), ConcreteNodePtr::Leaf(v) if v == value));
    }
}

#[test]
fn inner_node_pointer_round_trip() {
    let node_ptr = NodePtr::allocate_node(InnerNode4::empty());
    let opaque = node_ptr.to_opaque();

    assert!(!opaque.is_leaf());
    assert_eq!(opaque.as_leaf_value(), None);
    assert!(opaque.is::<InnerNode4>());
    assert!(!opaque.is::<InnerNode16>());
    assert!(matches!(opaque.to_node_ptr(), ConcreteNodePtr::Node4(_)));

    // SAFETY: The pointer was just allocated and is not aliased.
    unsafe { NodePtr::deallocate_node(node_ptr) };
}

#[test]
fn header_stores_capped_prefix() {
    let header = Header::new(NodeType::Node4, &[1, 2, 3], 3);
    assert_eq!(header.prefix_len(), 3);
    assert_eq!(header.capped_prefix_len(), 3);
    assert_eq!(header.read_prefix(), &[1, 2, 3]);

    let long = [7u8; 12];
    let header = Header::new(NodeType::Node4, &long[..NUM_PREFIX_BYTES], 12);
    assert_eq!(header.prefix_len(), 12);
    assert_eq!(header.capped_prefix_len(), NUM_PREFIX_BYTES);
    assert_eq!(header.read_prefix(), &[7; NUM_PREFIX_BYTES]);
}

#[test]
fn header_match_prefix_stops_at_divergence() {
    let header = Header::new(NodeType::Node4, &[1, 2, 3, 4], 4);

    assert_eq!(header.match_prefix(&[1, 2, 3, 4, 9]), 4);
    assert_eq!(header.match_prefix(&[1, 2, 9, 9]), 2);
    assert_eq!(header.match_prefix(&[9]), 0);
    assert_eq!(header.match_prefix(&[1, 2]), 2);
}

#[test]
fn header_ltrim_prefix() {
    let mut header = Header::new(NodeType::Node4, &[1, 2, 3, 4, 5], 5);
    header.ltrim_prefix(2);

    assert_eq!(header.prefix_len(), 3);
    assert_eq!(header.read_prefix(), &[3, 4, 5]);

    header.ltrim_prefix(3);
    assert_eq!(header.prefix_len(), 0);
    assert_eq!(header.read_prefix(), &[] as &[u8]);
}

#[test]
fn header_clear_then_push_concatenates() {
    // Concatenation of a parent prefix, edge byte, and child prefix during a
    // one-way collapse, with everything fitting in the stored cap.
    let mut child = Header::new(NodeType::Node4, &[8, 9], 2);
    let (old_prefix, old_len, old_capped) = child.clear_prefix();

    child.push_prefix(&[1, 2, 3], 3);
    child.push_prefix(&[4], 1);
    child.push_prefix(&old_prefix[..old_capped], old_len);

    assert_eq!(child.prefix_len(), 6);
    assert_eq!(child.read_prefix(), &[1, 2, 3, 4, 8, 9]);
}

#[test]
fn header_push_prefix_truncates_storage_but_sums_length() {
    let mut header = Header::new(NodeType::Node4, &[1, 2, 3, 4, 5, 6, 7], 7);
    header.push_prefix(&[8], 1);
    header.push_prefix(&[9, 10, 11], 3);

    // 7 + 1 + 3 bytes logically, only the first 9 stored.
    assert_eq!(header.prefix_len(), 11);
    assert_eq!(header.capped_prefix_len(), NUM_PREFIX_BYTES);
    assert_eq!(header.read_prefix(), &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn node4_write_child_keeps_keys_sorted() {
    let mut node = InnerNode4::empty();
    for key_fragment in [200u8, 3, 150, 80] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let (keys, _) = node.initialized_portion();
    assert_eq!(keys, &[3, 80, 150, 200]);

    for key_fragment in [3u8, 80, 150, 200] {
        let child = node.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
    assert_eq!(node.lookup_child(81), None);
}

#[test]
#[should_panic = "cannot write a child into a full node"]
fn node4_write_child_panics_when_full() {
    let mut node = InnerNode4::empty();
    for key_fragment in 0..=4u8 {
        node.write_child(key_fragment, leaf(0));
    }
}

#[test]
fn node4_remove_child_shifts_tail() {
    let mut node = InnerNode4::empty();
    for key_fragment in [1u8, 2, 3, 4] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let removed = node.remove_child(2).unwrap();
    assert_eq!(removed.as_leaf_value(), Some(2));
    assert_eq!(node.remove_child(2), None);

    let (keys, _) = node.initialized_portion();
    assert_eq!(keys, &[1, 3, 4]);
    assert_eq!(node.header.num_children(), 3);
    assert_eq!(node.lookup_child(3).unwrap().as_leaf_value(), Some(3));
}

#[test]
fn node4_overwrite_child() {
    let mut node = InnerNode4::empty();
    node.write_child(7, leaf(1));
    node.overwrite_child(7, leaf(2));

    assert_eq!(node.lookup_child(7).unwrap().as_leaf_value(), Some(2));
    assert_eq!(node.header.num_children(), 1);
}

#[test]
fn node4_min_max_iter() {
    let mut node = InnerNode4::empty();
    for key_fragment in [90u8, 10, 50] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    assert_eq!(node.min().0, 10);
    assert_eq!(node.max().0, 90);
    let fragments: Vec<u8> = node.iter().map(|(fragment, _)| fragment).collect();
    assert_eq!(fragments, vec![10, 50, 90]);
}

#[test]
fn node4_grows_into_sign_flipped_sorted_node16() {
    let mut node = InnerNode4::empty();
    for key_fragment in [0u8, 127, 128, 255] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let grown = node.grow();
    assert_eq!(grown.header.node_type(), NodeType::Node16);
    assert_eq!(grown.header.num_children(), 4);

    let (flipped_keys, _) = grown.initialized_portion();
    assert_eq!(flipped_keys, &[128, 255, 0, 127]);

    for key_fragment in [0u8, 127, 128, 255] {
        let child = grown.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
}

#[test]
fn node16_write_lookup_remove_across_sign_boundary() {
    let mut node = InnerNode16::empty();
    let fragments = [250u8, 0, 130, 2, 127, 128, 64, 200];
    for key_fragment in fragments {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    // Stored flipped and sorted as signed bytes means unsigned order of the
    // original fragments.
    let iterated: Vec<u8> = node.iter().map(|(fragment, _)| fragment).collect();
    let mut expected = fragments.to_vec();
    expected.sort_unstable();
    assert_eq!(iterated, expected);

    for key_fragment in fragments {
        let child = node.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
    assert_eq!(node.lookup_child(1), None);

    assert_eq!(node.remove_child(130).unwrap().as_leaf_value(), Some(130));
    assert_eq!(node.lookup_child(130), None);
    assert_eq!(node.header.num_children(), 7);
    assert_eq!(node.lookup_child(200).unwrap().as_leaf_value(), Some(200));
}

#[test]
fn node16_min_max() {
    let mut node = InnerNode16::empty();
    for key_fragment in [127u8, 5, 200, 128] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    assert_eq!(node.min().0, 5);
    assert_eq!(node.max().0, 200);
}

#[test]
fn node16_shrinks_into_raw_sorted_node4() {
    let mut node = InnerNode16::empty();
    for key_fragment in [180u8, 4, 90] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let shrunken = node.shrink();
    assert_eq!(shrunken.header.node_type(), NodeType::Node4);
    assert_eq!(shrunken.header.num_children(), 3);

    let (keys, _) = shrunken.initialized_portion();
    assert_eq!(keys, &[4, 90, 180]);
    for key_fragment in [4u8, 90, 180] {
        let child = shrunken.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
}

#[test]
fn node16_grows_into_node48() {
    let mut node = InnerNode16::empty();
    for key_fragment in 0..16u8 {
        node.write_child(key_fragment * 10, leaf(usize::from(key_fragment)));
    }
    assert!(node.is_full());

    let grown = node.grow();
    assert_eq!(grown.header.node_type(), NodeType::Node48);
    assert_eq!(grown.header.num_children(), 16);
    for key_fragment in 0..16u8 {
        let child = grown.lookup_child(key_fragment * 10).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
    assert_eq!(grown.lookup_child(5), None);
}

#[test]
fn node48_write_lookup_remove() {
    let mut node = InnerNode48::empty();
    for key_fragment in (0..48u8).map(|fragment| fragment.wrapping_mul(5)) {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }
    assert!(node.is_full());

    assert_eq!(node.lookup_child(5).unwrap().as_leaf_value(), Some(5));
    assert_eq!(node.lookup_child(6), None);

    assert_eq!(node.remove_child(5).unwrap().as_leaf_value(), Some(5));
    assert_eq!(node.lookup_child(5), None);
    assert_eq!(node.header.num_children(), 47);
}

#[test]
fn node48_reuses_freed_slot() {
    let mut node = InnerNode48::empty();
    for key_fragment in 0..48u8 {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    // Freeing an early slot leaves a hole that the next write must find,
    // since the slot at position `num_children` is occupied.
    node.remove_child(0).unwrap();
    node.write_child(100, leaf(100));

    assert_eq!(node.header.num_children(), 48);
    assert_eq!(node.lookup_child(100).unwrap().as_leaf_value(), Some(100));
    for key_fragment in 1..48u8 {
        assert_eq!(
            node.lookup_child(key_fragment).unwrap().as_leaf_value(),
            Some(usize::from(key_fragment))
        );
    }
}

#[test]
fn node48_min_max_iter_ascending() {
    let mut node = InnerNode48::empty();
    for key_fragment in [200u8, 3, 90, 255, 0] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    assert_eq!(node.min().0, 0);
    assert_eq!(node.max().0, 255);
    let fragments: Vec<u8> = node.iter().map(|(fragment, _)| fragment).collect();
    assert_eq!(fragments, vec![0, 3, 90, 200, 255]);
}

#[test]
fn node48_shrinks_into_node16() {
    let mut node = InnerNode48::empty();
    for key_fragment in [200u8, 3, 90, 130, 7, 255, 64, 32, 16, 8, 4, 2] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let shrunken = node.shrink();
    assert_eq!(shrunken.header.node_type(), NodeType::Node16);
    assert_eq!(shrunken.header.num_children(), 12);

    let iterated: Vec<u8> = shrunken.iter().map(|(fragment, _)| fragment).collect();
    assert_eq!(iterated, vec![2, 3, 4, 7, 8, 16, 32, 64, 90, 130, 200, 255]);
    for key_fragment in [200u8, 3, 90, 130, 7, 255, 64, 32, 16, 8, 4, 2] {
        let child = shrunken.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
}

#[test]
fn node48_grows_into_node256() {
    let mut node = InnerNode48::empty();
    for key_fragment in 0..48u8 {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let grown = node.grow();
    assert_eq!(grown.header.node_type(), NodeType::Node256);
    assert_eq!(grown.header.num_children(), 48);
    for key_fragment in 0..48u8 {
        let child = grown.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
    assert_eq!(grown.lookup_child(48), None);
}

#[test]
fn node256_write_lookup_remove_min_max() {
    let mut node = InnerNode256::empty();
    for key_fragment in [255u8, 0, 128, 1] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    assert_eq!(node.header.num_children(), 4);
    assert_eq!(node.min().0, 0);
    assert_eq!(node.max().0, 255);
    assert_eq!(node.lookup_child(128).unwrap().as_leaf_value(), Some(128));
    assert_eq!(node.lookup_child(2), None);

    assert_eq!(node.remove_child(0).unwrap().as_leaf_value(), Some(0));
    assert_eq!(node.remove_child(0), None);
    assert_eq!(node.header.num_children(), 3);
    assert_eq!(node.min().0, 1);
}

#[test]
fn node256_shrinks_into_node48() {
    let mut node = InnerNode256::empty();
    for key_fragment in (0..37u8).map(|fragment| fragment.wrapping_mul(6)) {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let shrunken = node.shrink();
    assert_eq!(shrunken.header.node_type(), NodeType::Node48);
    assert_eq!(shrunken.header.num_children(), 37);
    for key_fragment in (0..37u8).map(|fragment| fragment.wrapping_mul(6)) {
        let child = shrunken.lookup_child(key_fragment).unwrap();
        assert_eq!(child.as_leaf_value(), Some(usize::from(key_fragment)));
    }
}

#[test]
fn grow_and_shrink_preserve_the_header_prefix() {
    let header = Header::new(NodeType::Node4, &[9, 8, 7], 3);
    let mut node = InnerNode4::from_header(header);
    for key_fragment in [1u8, 2, 3, 4] {
        node.write_child(key_fragment, leaf(usize::from(key_fragment)));
    }

    let grown = node.grow();
    assert_eq!(grown.header.read_prefix(), &[9, 8, 7]);
    assert_eq!(grown.header.prefix_len(), 3);

    let shrunken = {
        let mut sixteen = grown;
        sixteen.remove_child(4).unwrap();
        sixteen.shrink()
    };
    assert_eq!(shrunken.header.read_prefix(), &[9, 8, 7]);
    assert_eq!(shrunken.header.prefix_len(), 3);
}

#[test]
fn restricted_index_bounds() {
    assert_eq!(u8::from(RestrictedNodeIndex::<48>::try_from(0).unwrap()), 0);
    assert_eq!(
        u8::from(RestrictedNodeIndex::<48>::try_from(47).unwrap()),
        47
    );
    assert!(RestrictedNodeIndex::<48>::try_from(48).is_err());
    assert_eq!(u8::from(RestrictedNodeIndex::<48>::EMPTY), 48);
}

#[test]
fn flip_sign_maps_unsigned_order_to_signed_order() {
    let mut fragments: Vec<u8> = vec![0, 1, 127, 128, 200, 255];
    fragments.sort_unstable();
    let mut flipped: Vec<i8> = fragments
        .iter()
        .map(|fragment| flip_sign(*fragment) as i8)
        .collect();
    let mut sorted_flipped = flipped.clone();
    sorted_flipped.sort_unstable();
    assert_eq!(flipped, sorted_flipped);

    flipped.reverse();
    assert_ne!(flipped, sorted_flipped);
}
