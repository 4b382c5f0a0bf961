use core::{borrow::Borrow, fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Links, Rebalance, TraversalOrder, TreeError, TreeNode};

/// An ordered set of keys stored in an [`AvlTree`].
///
/// A set always starts out with one seed key as its root. Inserting a key that is already present
/// or removing one that is absent fails with a [`TreeError`] and leaves the set unchanged.
///
/// ```
/// use cordyceps_avl::AvlSet;
///
/// let mut set = AvlSet::new(5);
/// set.insert(3).unwrap();
/// set.insert(8).unwrap();
///
/// assert!(set.contains(&8));
/// assert_eq!(set.visualize(), "5\n├── 8\n└── 3\n");
/// ```
pub struct AvlSet<K: Ord + fmt::Debug> {
    tree: AvlTree<SetNode<K>>,
}

pub(crate) struct SetNode<K> {
    links: Links<SetNode<K>>,
    key: K,
    _unpin: PhantomPinned,
}

impl<K> SetNode<K> {
    fn new(key: K) -> Box<Self> {
        Box::new(SetNode {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<K> Linked<Links<SetNode<K>>> for SetNode<K> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<K>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord + fmt::Debug> TreeNode<Links<SetNode<K>>> for SetNode<K> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug> AvlSet<K> {
    /// Creates a set holding only `seed`, rebalancing along the whole modified path.
    pub fn new(seed: K) -> Self {
        Self::with_rebalance(seed, Rebalance::default())
    }

    /// Creates a set holding only `seed`, using the given rebalance policy.
    pub fn with_rebalance(seed: K, rebalance: Rebalance) -> Self {
        let mut tree = AvlTree::with_rebalance(rebalance);

        // An empty tree accepts any key.
        if tree.insert(SetNode::new(seed)).is_err() {
            unreachable!("seed rejected by an empty tree");
        }

        Self { tree }
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the rebalance policy of the set.
    pub fn rebalance(&self) -> Rebalance {
        self.tree.rebalance()
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Adds `key` to the set.
    ///
    /// Fails with [`TreeError::DuplicateKey`], handing `key` back, if it is already present.
    pub fn insert(&mut self, key: K) -> Result<(), TreeError<K>> {
        self.tree
            .insert(SetNode::new(key))
            .map_err(|node| TreeError::DuplicateKey(node.key))
    }

    /// Removes `key` from the set and returns the stored key.
    ///
    /// Fails with [`TreeError::KeyNotFound`] if `key` is not present.
    pub fn remove(&mut self, key: &K) -> Result<K, TreeError<K>>
    where
        K: Clone,
    {
        match self.tree.remove(key) {
            Some(node) => Ok(node.key),
            None => Err(TreeError::KeyNotFound(key.clone())),
        }
    }

    /// Returns the smallest key in the set.
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|node| &node.get_ref().key)
    }

    /// Returns the largest key in the set.
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|node| &node.get_ref().key)
    }

    /// Returns the height of `key`'s node counted from the root, which has height 1.
    pub fn height_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.height_of(key)
    }

    /// Returns the balance factor of `key`'s node.
    pub fn balance_factor_of<Q>(&self, key: &Q) -> Option<isize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.balance_factor_of(key)
    }

    /// Returns the number of nodes on the longest path from the root to a leaf.
    pub fn tree_height(&self) -> usize {
        self.tree.tree_height()
    }

    /// Collects the keys of the set in the given order.
    pub fn traverse(&self, order: TraversalOrder) -> Vec<&K> {
        self.tree
            .traverse(order)
            .into_iter()
            .map(|node| &node.key)
            .collect()
    }

    /// Returns an iterator over the keys in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.tree.iter().map(|node| &node.key)
    }

    /// Renders the set as a text tree. See [`Visualize`](crate::Visualize) for the layout.
    pub fn visualize(&self) -> String
    where
        K: fmt::Display,
    {
        self.tree.visualize()
    }

    /// Clears the set, removing all elements including the seed.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Writes the set as a Graphviz digraph named `name`.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        self.tree.dotgraph(name, w)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for AvlSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug + fmt::Display> fmt::Display for AvlSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.tree.display(), f)
    }
}
