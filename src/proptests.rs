use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

/// A sorted multiset, the reference both variants are checked against.
#[derive(Default)]
struct Model {
    counts: BTreeMap<u16, usize>,
    len: usize,
}

impl Model {
    fn insert(&mut self, key: u16) {
        *self.counts.entry(key).or_insert(0) += 1;
        self.len += 1;
    }

    fn remove(&mut self, key: u16) -> bool {
        let Some(n) = self.counts.get_mut(&key) else {
            return false;
        };
        *n -= 1;
        if *n == 0 {
            self.counts.remove(&key);
        }
        self.len -= 1;
        true
    }

    fn contains(&self, key: u16) -> bool {
        self.counts.contains_key(&key)
    }

    fn keys(&self) -> Vec<u16> {
        self.counts
            .iter()
            .flat_map(|(&k, &n)| std::iter::repeat(k).take(n))
            .collect()
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.len = 0;
    }
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u16),
    Remove(u16),
    Find(u16),
    Rebuild,
    Clear,
}

fn key_strategy() -> impl Strategy<Value = u16> + Clone {
    // A narrow key range so duplicates and repeated removals are common.
    0u16..300
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => key.clone().prop_map(Op::Insert),
        25 => key.clone().prop_map(Op::Remove),
        23 => key.clone().prop_map(Op::Find),
        1 => Just(Op::Rebuild),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=2000)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_plain(ops in ops_strategy(), bucket_size in 1usize..8) {
        let mut s: PoleSet<u16> = PoleSet::with_bucket_size(bucket_size);
        let mut m = Model::default();

        for op in ops {
            match op {
                Op::Insert(k) => {
                    s.insert(k);
                    m.insert(k);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(s.remove(&k), m.remove(k));
                }
                Op::Find(k) => {
                    prop_assert_eq!(s.find(&k), m.contains(k));
                }
                Op::Rebuild => {
                    s.shrink_to_fit();
                }
                Op::Clear => {
                    s.clear();
                    m.clear();
                }
            }

            prop_assert_eq!(s.len(), m.len);
        }

        s.validate();
        prop_assert_eq!(s.iter().copied().collect::<Vec<_>>(), m.keys());
    }

    #[test]
    fn prop_equivalence_unrolled(ops in ops_strategy(), bucket_size in 1usize..8) {
        let mut s: UnrolledPoleSet<u16> = UnrolledPoleSet::with_bucket_size(bucket_size);
        let mut m = Model::default();

        for op in ops {
            match op {
                Op::Insert(k) => {
                    s.insert(k);
                    m.insert(k);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(s.remove(&k), m.remove(k));
                }
                Op::Find(k) => {
                    prop_assert_eq!(s.find(&k), m.contains(k));
                }
                Op::Rebuild => {
                    s.rebuild();
                    prop_assert_eq!(s.removed(), 0);
                }
                Op::Clear => {
                    s.clear();
                    m.clear();
                }
            }

            prop_assert_eq!(s.len(), m.len);
            // Compaction runs before tombstones can outgrow the live keys.
            prop_assert!(s.removed() <= s.len() + 1);
        }

        s.validate();
        prop_assert_eq!(s.iter().copied().collect::<Vec<_>>(), m.keys());
    }

    #[test]
    fn prop_rebuild_preserves_keys(keys in prop::collection::vec(key_strategy(), 0..500),
                                   removals in prop::collection::vec(key_strategy(), 0..500)) {
        let mut s: UnrolledPoleSet<u16> = keys.iter().copied().collect();
        for k in &removals {
            s.remove(k);
        }
        let before: Vec<u16> = s.iter().copied().collect();

        s.rebuild();
        s.validate();
        prop_assert_eq!(s.removed(), 0);
        prop_assert_eq!(s.iter().copied().collect::<Vec<_>>(), before.clone());
        prop_assert_eq!(s.block_count(), before.len().div_ceil(BLOCK_CAPACITY));
        for k in &before {
            prop_assert!(s.find(k));
        }
    }
}

/// Inserts every permutation of a small key set, with duplicates, into both
/// variants and checks order and membership after each one.
#[test]
fn exhaustive_insert_order_small_set() {
    let keys = [3u16, 1, 4, 1, 5, 9];

    for_each_permutation(&keys, |perm| {
        for bucket_size in [1, 2] {
            let mut plain = PoleSet::with_bucket_size(bucket_size);
            let mut unrolled = UnrolledPoleSet::with_bucket_size(bucket_size);
            for &k in &perm {
                plain.insert(k);
                unrolled.insert(k);
            }
            plain.validate();
            unrolled.validate();

            let mut expected = perm.clone();
            expected.sort_unstable();
            assert!(plain.iter().copied().eq(expected.iter().copied()));
            assert!(unrolled.iter().copied().eq(expected.iter().copied()));
            for k in 0..11 {
                assert_eq!(plain.find(&k), expected.contains(&k));
                assert_eq!(unrolled.find(&k), expected.contains(&k));
            }
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u16> = vec![2, 7, 7, 11, 13, 20];

    let mut base_plain = PoleSet::with_bucket_size(1);
    let mut base_unrolled = UnrolledPoleSet::new();
    for &k in &keys {
        base_plain.insert(k);
        base_unrolled.insert(k);
    }

    for_each_permutation(&keys, |perm| {
        let mut plain = base_plain.clone();
        let mut unrolled = base_unrolled.clone();

        for (i, k) in perm.iter().enumerate() {
            assert!(plain.remove(k));
            assert!(unrolled.remove(k));
            assert_eq!(plain.len(), keys.len() - i - 1);
            assert_eq!(unrolled.len(), keys.len() - i - 1);
            plain.validate();
            unrolled.validate();
        }
        assert!(plain.is_empty());
        assert!(unrolled.is_empty());
        assert!(!plain.remove(&7));
        assert!(!unrolled.remove(&7));
    });
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}
