use std::ops::Range;

use proptest::prelude::*;

use crate::model;

use super::*;

#[derive(Debug)]
#[repr(C)]
struct TestNode {
    links: Links<TestNode>,
    key: u32,
}

impl TestNode {
    fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

fn set_of(seed: u32, keys: &[u32], rebalance: Rebalance) -> AvlSet<u32> {
    let mut set = AvlSet::with_rebalance(seed, rebalance);

    for &key in keys {
        set.insert(key).unwrap();
        set.assert_invariants();
    }

    set
}

fn preorder(set: &AvlSet<u32>) -> Vec<u32> {
    set.traverse(TraversalOrder::PreOrder)
        .into_iter()
        .copied()
        .collect()
}

// Every ordering of `0..n`, in lexicographic order.
fn permutations(n: u32) -> Vec<Vec<u32>> {
    fn extend(prefix: &mut Vec<u32>, n: u32, out: &mut Vec<Vec<u32>>) {
        if prefix.len() == n as usize {
            out.push(prefix.clone());
            return;
        }

        for key in 0..n {
            if !prefix.contains(&key) {
                prefix.push(key);
                extend(prefix, n, out);
                prefix.pop();
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::new(), n, &mut out);
    out
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(!node.links.is_linked());
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        tree.remove(key).expect("item not found");
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn small_permutations_find() {
    for n in 2..=6 {
        for keys in permutations(n) {
            insert_find_all(&keys);
        }
    }
}

#[test]
fn small_permutations_remove() {
    for n in 1..=6 {
        for keys in permutations(n) {
            insert_remove_all(&keys);
        }
    }
}

#[test]
fn duplicate_handle_is_returned() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(7)).unwrap();

    let rejected = tree.insert(TestNode::new(7)).unwrap_err();
    assert_eq!(rejected.key, 7);
    assert!(!rejected.links.is_linked());
    assert_eq!(tree.len(), 1);
}

#[test]
fn removed_node_can_be_reinserted() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [4, 2, 6, 1, 3] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let node = tree.remove(&2).unwrap();
    tree.assert_invariants();

    tree.insert(node).unwrap();
    tree.assert_invariants();
    assert_eq!(
        tree.iter().map(|node| node.key).collect::<Vec<_>>(),
        [1, 2, 3, 4, 6]
    );
}

#[test]
fn first_and_last() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());

    for key in [10, 4, 17, 1, 12, 30] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    assert_eq!(tree.first().map(|node| node.key), Some(1));
    assert_eq!(tree.last().map(|node| node.key), Some(30));
}

#[test]
fn clear_empties_the_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in 0..32 {
        tree.insert(TestNode::new(key)).unwrap();
    }

    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.iter().count(), 0);
    tree.assert_invariants();

    tree.insert(TestNode::new(3)).unwrap();
    assert_eq!(tree.len(), 1);
}

#[test]
fn iter_is_sorted_and_sized() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [50, 20, 80, 10, 30, 25, 27, 90, 85, 60] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let iter = tree.iter();
    assert_eq!(iter.len(), 10);

    let keys: Vec<u32> = (&tree).into_iter().map(|node| node.key).collect();
    assert_eq!(keys, [10, 20, 25, 27, 30, 50, 60, 80, 85, 90]);
}

#[test]
fn rr_rotation() {
    let set = set_of(1, &[2, 3], Rebalance::Path);

    assert_eq!(preorder(&set), [2, 1, 3]);
    assert_eq!(set.balance_factor_of(&2), Some(0));
}

#[test]
fn ll_rotation() {
    let set = set_of(3, &[2, 1], Rebalance::Path);

    assert_eq!(preorder(&set), [2, 1, 3]);
    assert_eq!(set.balance_factor_of(&2), Some(0));
}

#[test]
fn lr_rotation() {
    let set = set_of(3, &[1, 2], Rebalance::Path);

    assert_eq!(preorder(&set), [2, 1, 3]);
    assert_eq!(set.balance_factor_of(&2), Some(0));
}

#[test]
fn rl_rotation() {
    let set = set_of(1, &[3, 2], Rebalance::Path);

    assert_eq!(preorder(&set), [2, 1, 3]);
    assert_eq!(set.balance_factor_of(&2), Some(0));
}

#[test]
fn three_key_rotations_match_under_root_only() {
    for keys in [[1, 2, 3], [3, 2, 1], [3, 1, 2], [1, 3, 2]] {
        let set = set_of(keys[0], &keys[1..], Rebalance::RootOnly);
        assert_eq!(preorder(&set), [2, 1, 3], "inserted {keys:?}");
    }
}

#[test]
fn path_rebalances_below_the_root() {
    let set = set_of(1, &[2, 3, 4, 5], Rebalance::Path);
    assert_eq!(preorder(&set), [2, 1, 4, 3, 5]);

    let set = set_of(1, &[2, 3, 4, 5, 6], Rebalance::Path);
    assert_eq!(preorder(&set), [4, 2, 1, 3, 5, 6]);
    assert_eq!(set.tree_height(), 3);
}

#[test]
fn root_only_leaves_imbalance_below_the_root() {
    let set = set_of(1, &[2, 3, 4, 5], Rebalance::RootOnly);
    assert_eq!(preorder(&set), [3, 2, 1, 4, 5]);

    let set = set_of(1, &[2, 3, 4, 5, 6], Rebalance::RootOnly);
    assert_eq!(preorder(&set), [3, 2, 1, 4, 5, 6]);
    assert_eq!(set.balance_factor_of(&3), Some(-1));
    assert_eq!(set.balance_factor_of(&4), Some(-2));
    assert_eq!(set.tree_height(), 4);
}

#[test]
fn root_only_takes_lr_for_a_balanced_left_child() {
    // After 5 is inserted the root 6 sits at +2 over a balanced left child 2.
    let set = set_of(0, &[1, 2, 7, 6, 4, 3], Rebalance::RootOnly);
    assert_eq!(preorder(&set), [6, 2, 1, 0, 4, 3, 7]);

    let set = set_of(0, &[1, 2, 7, 6, 4, 3, 5], Rebalance::RootOnly);
    assert_eq!(preorder(&set), [4, 2, 1, 0, 3, 6, 5, 7]);
    assert_eq!(set.balance_factor_of(&4), Some(1));
    assert_eq!(set.balance_factor_of(&2), Some(1));
}

// A plain owned BST that rebalances only its root after each insertion.
struct PlainNode {
    key: u32,
    left: Option<Box<PlainNode>>,
    right: Option<Box<PlainNode>>,
}

fn plain_height(node: &Option<Box<PlainNode>>) -> isize {
    node.as_ref()
        .map_or(0, |n| 1 + plain_height(&n.left).max(plain_height(&n.right)))
}

fn plain_factor(node: &PlainNode) -> isize {
    plain_height(&node.left) - plain_height(&node.right)
}

fn plain_rotate_ll(mut node: Box<PlainNode>) -> Box<PlainNode> {
    let mut pivot = node.left.take().unwrap();
    node.left = pivot.right.take();
    pivot.right = Some(node);
    pivot
}

fn plain_rotate_rr(mut node: Box<PlainNode>) -> Box<PlainNode> {
    let mut pivot = node.right.take().unwrap();
    node.right = pivot.left.take();
    pivot.left = Some(node);
    pivot
}

fn plain_balance(mut node: Box<PlainNode>) -> Box<PlainNode> {
    let factor = plain_factor(&node);

    if factor > 1 {
        if plain_factor(node.left.as_ref().unwrap()) <= 0 {
            node.left = node.left.take().map(plain_rotate_rr);
        }
        plain_rotate_ll(node)
    } else if factor < -1 {
        if plain_factor(node.right.as_ref().unwrap()) > 0 {
            node.right = node.right.take().map(plain_rotate_ll);
        }
        plain_rotate_rr(node)
    } else {
        node
    }
}

fn plain_insert(slot: &mut Option<Box<PlainNode>>, key: u32) {
    match slot {
        None => {
            *slot = Some(Box::new(PlainNode {
                key,
                left: None,
                right: None,
            }))
        }
        Some(node) if key < node.key => plain_insert(&mut node.left, key),
        Some(node) => plain_insert(&mut node.right, key),
    }
}

fn plain_preorder(node: &Option<Box<PlainNode>>, out: &mut Vec<u32>) {
    if let Some(node) = node {
        out.push(node.key);
        plain_preorder(&node.left, out);
        plain_preorder(&node.right, out);
    }
}

fn plain_root_only(keys: &[u32]) -> Vec<u32> {
    let mut root = None;

    for &key in keys {
        plain_insert(&mut root, key);
        root = root.map(plain_balance);
    }

    let mut out = Vec::new();
    plain_preorder(&root, &mut out);
    out
}

#[test]
fn root_only_matches_plain_root_balancer() {
    for n in 2..=8 {
        for keys in permutations(n) {
            let set = set_of(keys[0], &keys[1..], Rebalance::RootOnly);
            assert_eq!(preorder(&set), plain_root_only(&keys), "inserted {keys:?}");
        }
    }
}

#[test]
fn contains_after_insert_and_remove() {
    let mut set = AvlSet::new(10u32);

    assert!(!set.contains(&4));
    set.insert(4).unwrap();
    assert!(set.contains(&4));

    assert_eq!(set.remove(&4), Ok(4));
    assert!(!set.contains(&4));
    assert!(set.contains(&10));
}

#[test]
fn duplicate_insert_leaves_set_unchanged() {
    let mut set = set_of(5, &[3, 8], Rebalance::Path);
    let before = set.visualize();

    assert_eq!(set.insert(3), Err(TreeError::DuplicateKey(3)));
    assert_eq!(set.insert(5), Err(TreeError::DuplicateKey(5)));
    assert_eq!(set.len(), 3);
    assert_eq!(set.visualize(), before);
    set.assert_invariants();
}

#[test]
fn missing_remove_leaves_set_unchanged() {
    let mut set = set_of(5, &[3, 8], Rebalance::Path);
    let before = set.visualize();

    assert_eq!(set.remove(&42), Err(TreeError::KeyNotFound(42)));
    assert_eq!(set.len(), 3);
    assert_eq!(set.visualize(), before);
}

#[test]
fn count_tracks_inserts_and_removes() {
    let inserted: Vec<u32> = (0..40).map(|i| i * 7 % 101).filter(|&k| k != 50).collect();
    let mut set = set_of(50, &inserted, Rebalance::Path);

    let removed = &inserted[..15];
    for key in removed {
        set.remove(key).unwrap();
        set.assert_invariants();
    }

    assert_eq!(set.len(), 1 + inserted.len() - removed.len());
}

#[test]
fn visualize_small_tree() {
    let set = set_of(5, &[3, 8], Rebalance::Path);

    assert_eq!(set.visualize(), "5\n├── 8\n└── 3\n");
    assert_eq!(set.to_string(), "5\n├── 8\n└── 3\n");
}

#[test]
fn visualize_nested_tree() {
    let set = set_of(4, &[2, 6, 1, 3, 5, 7], Rebalance::Path);

    assert_eq!(
        set.visualize(),
        "4\n├── 6\n│   ├── 7\n│   └── 5\n└── 2\n    ├── 3\n    └── 1\n"
    );
}

#[test]
fn visualize_lone_children() {
    let set = set_of(5, &[3, 8, 9, 1], Rebalance::Path);

    assert_eq!(set.visualize(), "5\n├── 8\n│   ├── 9\n└── 3\n    └── 1\n");
}

#[test]
fn traversal_orders() {
    let set = set_of(4, &[2, 6, 1, 3, 5, 7], Rebalance::Path);

    let collect = |order| -> Vec<u32> { set.traverse(order).into_iter().copied().collect() };

    assert_eq!(collect(TraversalOrder::PreOrder), [4, 2, 1, 3, 6, 5, 7]);
    assert_eq!(collect(TraversalOrder::InOrder), [1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(collect(TraversalOrder::PostOrder), [1, 3, 2, 5, 7, 6, 4]);
}

#[test]
fn node_height_is_depth_from_root() {
    let set = set_of(4, &[2, 6, 1, 3, 5, 7], Rebalance::Path);

    assert_eq!(set.height_of(&4), Some(1));
    assert_eq!(set.height_of(&6), Some(2));
    assert_eq!(set.height_of(&1), Some(3));
    assert_eq!(set.height_of(&100), None);
    assert_eq!(set.tree_height(), 3);
    assert_eq!(set.balance_factor_of(&4), Some(0));

    let set = set_of(2, &[1], Rebalance::Path);
    assert_eq!(set.height_of(&1), Some(2));
    assert_eq!(set.balance_factor_of(&2), Some(1));
    assert_eq!(set.balance_factor_of(&1), Some(0));
}

#[test]
fn remove_leaf() {
    let mut set = set_of(5, &[3, 8], Rebalance::Path);

    assert_eq!(set.remove(&3), Ok(3));
    assert_eq!(set.visualize(), "5\n├── 8\n");
    set.assert_invariants();
}

#[test]
fn remove_node_with_one_child() {
    let mut set = set_of(5, &[3, 8, 9], Rebalance::Path);

    assert_eq!(set.remove(&8), Ok(8));
    assert_eq!(set.visualize(), "5\n├── 9\n└── 3\n");
    set.assert_invariants();
}

#[test]
fn remove_node_with_two_children_uses_successor() {
    let mut set = set_of(5, &[3, 8, 7, 9], Rebalance::Path);

    assert_eq!(set.remove(&5), Ok(5));
    assert_eq!(set.visualize(), "7\n├── 8\n│   ├── 9\n└── 3\n");
    set.assert_invariants();

    // The successor is the right child itself.
    let mut set = set_of(5, &[3, 8, 9], Rebalance::Path);

    assert_eq!(set.remove(&5), Ok(5));
    assert_eq!(set.visualize(), "8\n├── 9\n└── 3\n");
    set.assert_invariants();
}

#[test]
fn remove_rebalances_under_path() {
    let mut set = set_of(5, &[3, 8, 9], Rebalance::Path);

    set.remove(&3).unwrap();
    assert_eq!(preorder(&set), [8, 5, 9]);
    set.assert_invariants();
}

#[test]
fn remove_does_not_rebalance_under_root_only() {
    let mut set = set_of(5, &[3, 8, 9], Rebalance::RootOnly);

    set.remove(&3).unwrap();
    assert_eq!(preorder(&set), [5, 8, 9]);
    assert_eq!(set.balance_factor_of(&5), Some(-2));
    set.assert_invariants();
}

#[test]
fn removing_the_last_key_empties_the_set() {
    let mut set = AvlSet::new(1u32);

    assert_eq!(set.remove(&1), Ok(1));
    assert!(set.is_empty());
    assert_eq!(set.visualize(), "");
    assert_eq!(set.tree_height(), 0);
    assert_eq!(set.first(), None);

    set.insert(2).unwrap();
    assert_eq!(set.visualize(), "2\n");
}

#[test]
fn path_policy_stays_logarithmic() {
    let keys: Vec<u32> = (1..1024).collect();
    let set = set_of(0, &keys, Rebalance::Path);

    // A perfectly balanced tree over 1024 keys has 11 levels.
    assert_eq!(set.len(), 1024);
    assert_eq!(set.tree_height(), 11);
}

#[test]
fn debug_lists_keys_in_order() {
    let set = set_of(2, &[3, 1], Rebalance::Path);
    assert_eq!(format!("{set:?}"), "{1, 2, 3}");
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(
        seed in 0u32..1000,
        root_only in any::<bool>(),
        ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE),
    ) {
        model::run_btree_equivalence(model::EquivalenceInput { seed, root_only, ops });
    }
}
