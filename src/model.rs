//! A differential model checking [`AvlSet`] against [`BTreeSet`].
//!
//! Used by the property tests and by the `btree_equivalence` fuzz target.

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::{AvlSet, Rebalance, TraversalOrder, TreeError};

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    First,
    Last,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        // `Index` values pick an existing key so duplicates and hits are exercised.
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::Last => FinalOp::Last,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Contains(u32),
    Remove(u32),
    First,
    Last,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Contains),
        value_strategy().prop_map(Op::Remove),
        Just(Op::First),
        Just(Op::Last),
    ]
}

/// Input of one differential run: the seed key, the policy and the operations to replay.
#[derive(Clone, Debug, Arbitrary)]
pub struct EquivalenceInput {
    pub seed: u32,
    pub root_only: bool,
    pub ops: Vec<Op>,
}

pub fn run_btree_equivalence(input: EquivalenceInput) {
    let EquivalenceInput {
        seed,
        root_only,
        ops,
    } = input;

    let rebalance = if root_only {
        Rebalance::RootOnly
    } else {
        Rebalance::Path
    };

    let mut sorted_values = vec![seed];
    let mut btree = BTreeSet::from([seed]);
    let mut avl = AvlSet::with_rebalance(seed, rebalance);

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        if let Err(idx) = v.binary_search(&value) {
            v.insert(idx, value);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);

                let from_btree = if btree.insert(value) {
                    Ok(())
                } else {
                    Err(TreeError::DuplicateKey(value))
                };
                let from_avl = avl.insert(value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Contains(value) => {
                let from_btree = btree.contains(&value);
                let from_avl = avl.contains(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_btree = if btree.remove(&value) {
                    Ok(value)
                } else {
                    Err(TreeError::KeyNotFound(value))
                };
                let from_avl = avl.remove(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                assert_eq!(btree.first(), avl.first(), "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                assert_eq!(btree.last(), avl.last(), "FinalOp #{op_id}: {final_op:?}");
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().eq(avl.iter()));
        assert!(btree.iter().eq(avl.traverse(TraversalOrder::InOrder)));
    }

    let deepest = avl
        .iter()
        .filter_map(|key| avl.height_of(key))
        .max()
        .unwrap_or(0);
    assert_eq!(deepest, avl.tree_height());
}
