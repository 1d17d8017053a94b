//! Property-based tests for the sharding and filter invariants.
//!
//! - Partition coverage: every element exactly once, order preserved,
//!   shard size variance ≤ 1, for any input and shard count.
//! - Filter one-sidedness: an inserted key never tests negative, through
//!   an encode/decode round trip.

use proptest::prelude::*;

use bloom_audit::{partition, ScalableBloomFilter, ShardAssignment};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: partition covers the input exactly once, in order.
    #[test]
    fn prop_partition_coverage(
        items in proptest::collection::vec(0u64..10_000, 0..200),
        shard_count in 1usize..16,
    ) {
        let shards = partition(&items, shard_count);
        prop_assert_eq!(shards.len(), shard_count);

        let flattened: Vec<u64> = shards.iter().flatten().copied().collect();
        prop_assert_eq!(flattened, items);
    }

    /// Property: shard sizes differ by at most one.
    #[test]
    fn prop_partition_balance(
        len in 0usize..500,
        shard_count in 1usize..16,
    ) {
        let items: Vec<usize> = (0..len).collect();
        let shards = partition(&items, shard_count);

        let max = shards.iter().map(Vec::len).max().unwrap();
        let min = shards.iter().map(Vec::len).min().unwrap();
        prop_assert!(max - min <= 1);
    }

    /// Property: the same input yields the same partition on every
    /// instance, and the per-ordinal owned shards tile the input.
    #[test]
    fn prop_owned_shards_are_deterministic_and_disjoint(
        items in proptest::collection::vec(any::<u32>(), 0..120),
        total in 1u32..8,
    ) {
        let mut reassembled = Vec::new();
        for ordinal in 0..total {
            let a = ShardAssignment::new(ordinal, total).unwrap();
            let b = ShardAssignment::new(ordinal, total).unwrap();
            prop_assert_eq!(a.owned_shard(&items), b.owned_shard(&items));
            reassembled.extend(a.owned_shard(&items));
        }
        prop_assert_eq!(reassembled, items);
    }

    /// Property: no false negatives across an encode/decode round trip.
    #[test]
    fn prop_filter_never_loses_inserted_keys(
        keys in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..32), 1..64),
    ) {
        let mut filter = ScalableBloomFilter::with_slice(1 << 14, 4);
        for key in &keys {
            filter.insert(key);
        }
        let decoded = ScalableBloomFilter::decode(&filter.encode()).unwrap();
        for key in &keys {
            prop_assert!(decoded.test(key));
        }
    }
}
