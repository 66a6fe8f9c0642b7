use crate::{
    bytes::KeySource,
    tests_common::{setup_index_from_table, setup_index_from_values, KeyTable},
    visitor::{TreeStatsCollector, WellFormedChecker},
    ArtIndex, BigEndianU64, NUM_PREFIX_BYTES,
};

#[test]
fn split_leaf_into_node4_with_common_prefix() {
    // The two keys share their first seven bytes, which become the prefix of
    // the node created by the leaf split.
    let index = setup_index_from_values([0x0000_0000_0000_0001, 0x0000_0000_0000_0002]);

    assert_eq!(WellFormedChecker::check(&index), Ok(3));
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node4_count, 1);
    assert_eq!(stats.leaf_count, 2);

    assert_eq!(index.get(&1u64.to_be_bytes()), Some(1));
    assert_eq!(index.get(&2u64.to_be_bytes()), Some(2));
    assert_eq!(index.minimum(), Some(1));
    assert_eq!(index.maximum(), Some(2));
}

#[test]
fn prefix_split_in_stored_region() {
    // A and B share seven bytes; C diverges at the fifth byte, splitting the
    // compressed path of the node holding A and B.
    let key_a = 0x1122_3344_5566_7701u64;
    let key_b = 0x1122_3344_5566_7702u64;
    let key_c = 0x1122_3344_9999_9901u64;

    let mut index = setup_index_from_values([key_a, key_b]);
    index
        .insert(&key_c.to_be_bytes(), key_c as usize)
        .unwrap();

    assert_eq!(WellFormedChecker::check(&index), Ok(5));
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node4_count, 2);
    assert_eq!(stats.leaf_count, 3);

    for value in [key_a, key_b, key_c] {
        assert_eq!(index.get(&value.to_be_bytes()), Some(value as usize));
    }
    assert_eq!(index.minimum(), Some(key_a as usize));
    assert_eq!(index.maximum(), Some(key_c as usize));
}

#[test]
fn prefix_split_in_reconstructed_region() {
    // The shared prefix exceeds the stored cap, so splitting it must pull the
    // trailing bytes back out of a leaf key.
    let shared = [b's'; NUM_PREFIX_BYTES + 5];
    let mut table = KeyTable::new();
    let mut key_a = shared.to_vec();
    key_a.push(b'a');
    table.push(&key_a);
    let mut key_b = shared.to_vec();
    key_b.push(b'b');
    table.push(&key_b);

    // Diverges two bytes past the stored cap.
    let mut key_c = shared.to_vec();
    key_c[NUM_PREFIX_BYTES + 1] = b'!';
    key_c.push(b'c');
    let value_c = table.push(&key_c);

    let index = setup_index_from_table(table);

    assert_eq!(WellFormedChecker::check(&index), Ok(5));
    assert_eq!(index.get(&key_a), Some(0));
    assert_eq!(index.get(&key_b), Some(1));
    assert_eq!(index.get(&key_c), Some(value_c));
    assert_eq!(index.get_pessimistic(&key_a), Some(0));
    assert_eq!(index.get_pessimistic(&key_c), Some(value_c));
    // The divergent branch sorts below the straight one ('!' < 's').
    assert_eq!(index.minimum(), Some(value_c));
    assert_eq!(index.maximum(), Some(1));
}

#[test]
fn growth_to_node16_on_fifth_child() {
    let mut index = setup_index_from_values(1..=4u64);
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node4_count, 1);

    index.insert(&5u64.to_be_bytes(), 5).unwrap();

    assert!(WellFormedChecker::check(&index).is_ok());
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node4_count, 0);
    assert_eq!(stats.node16_count, 1);
    for value in 1..=5u64 {
        assert_eq!(index.get(&value.to_be_bytes()), Some(value as usize));
    }
}

#[test]
fn growth_to_node48_on_seventeenth_child() {
    // Keys differing in their first byte, exercising the topmost node.
    let index = setup_index_from_values((1..=17u64).map(|value| value << 56));

    assert!(WellFormedChecker::check(&index).is_ok());
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node16_count, 0);
    assert_eq!(stats.node48_count, 1);
    for value in 1..=17u64 {
        assert_eq!(index.get(&(value << 56).to_be_bytes()), Some((value << 56) as usize));
    }
    assert_eq!(index.minimum(), Some((1u64 << 56) as usize));
    assert_eq!(index.maximum(), Some((17u64 << 56) as usize));
}

#[test]
fn growth_to_node256_on_forty_ninth_child() {
    let mut index = setup_index_from_values((0..48u64).map(|value| value << 56));
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node48_count, 1);

    index.insert(&(48u64 << 56).to_be_bytes(), (48usize) << 56).unwrap();

    assert!(WellFormedChecker::check(&index).is_ok());
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node48_count, 0);
    assert_eq!(stats.node256_count, 1);
    for value in 0..=48u64 {
        assert_eq!(
            index.get(&(value << 56).to_be_bytes()),
            Some((value << 56) as usize)
        );
    }
}

#[test]
fn inserting_a_prefix_of_an_existing_key_is_an_error() {
    let mut table = KeyTable::new();
    let long = table.push(b"variable-width");
    let short = table.push(b"variable");

    let mut index = ArtIndex::new(table);
    let long_key = index.key_source().load_key(long);
    index.insert(&long_key, long).unwrap();

    let short_key = index.key_source().load_key(short);
    let error = index.insert(&short_key, short).unwrap_err();
    assert_eq!(&*error.byte_repr, b"variable".as_slice());
    assert_eq!(index.len(), 1);
}

#[test]
fn keys_differing_only_in_final_byte() {
    let base = 0x2ABB_CCDD_EEFF_0000u64;
    let index = setup_index_from_values((0..=255u64).map(|low| base | low));

    assert!(WellFormedChecker::check(&index).is_ok());
    let stats = TreeStatsCollector::collect(&index);
    assert_eq!(stats.node256_count, 1);
    assert_eq!(stats.leaf_count, 256);
    for low in 0..=255u64 {
        let value = base | low;
        assert_eq!(index.get(&value.to_be_bytes()), Some(value as usize));
    }
}

#[test]
fn insert_mixed_depth_structure_stays_well_formed() {
    let mut index = ArtIndex::new(BigEndianU64);
    let values = [
        0x0101_0101_0101_0101u64,
        0x0101_0101_0101_0102,
        0x0101_0101_0201_0101,
        0x0102_0101_0101_0101,
        0x0202_0202_0202_0202,
        0x0202_0202_0202_0203,
        0x0202_0202_0302_0202,
    ];

    for value in values {
        index.insert(&value.to_be_bytes(), value as usize).unwrap();
        assert!(WellFormedChecker::check(&index).is_ok());
    }

    for value in values {
        assert_eq!(index.get(&value.to_be_bytes()), Some(value as usize));
    }
    assert_eq!(index.len(), values.len());
}
