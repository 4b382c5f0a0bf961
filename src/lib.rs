//! An intrusive AVL tree with parent links.

// Conventions used in comments:
// - The subtree height of a node `x` is denoted `h(x)`; a missing child has height 0.
// - The depth of `x` counts the nodes from `x` up to and including the root, so the root has
//   depth 1. The public API calls this the height of `x` (`height_of`).
// - The balance factor of `x` is `h(left(x)) - h(right(x))`.
//
// The invariants of the tree are:
// 1. Every child's parent link points at the node holding it, and the root has no parent.
// 2. Keys in a left subtree sort below the node, keys in a right subtree sort above it.
// 3. Under `Rebalance::Path`, every balance factor is -1, 0 or 1.
//
// Heights are not cached. `h(x)` is recomputed on demand, so a rebalance pass costs time
// proportional to the size of the subtree it inspects.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;
use log::{debug, trace};

mod config;
mod debug;
mod error;
mod iter;
mod set;
mod traverse;
mod visualize;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use config::Rebalance;
pub use error::TreeError;
pub use iter::Iter;
pub use set::AvlSet;
pub use traverse::TraversalOrder;
pub use visualize::Visualize;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Nodes embed a [`Links`] field and are owned by the tree through their [`Linked`] handle from
/// insertion until removal. Balance is restored with the four classic rotations (LL, RR, LR and
/// RL); how far up the tree a rebalance pass reaches is chosen by the [`Rebalance`] policy.
///
/// The tree stores raw pointers and is neither `Send` nor `Sync`.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
    rebalance: Rebalance,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree that rebalances along the whole insertion path.
    pub const fn new() -> AvlTree<T> {
        Self::with_rebalance(Rebalance::Path)
    }

    /// Returns a new empty tree using the given rebalance policy.
    pub const fn with_rebalance(rebalance: Rebalance) -> AvlTree<T> {
        AvlTree {
            root: None,
            len: 0,
            rebalance,
        }
    }

    /// Returns the rebalance policy of the tree.
    pub const fn rebalance(&self) -> Rebalance {
        self.rebalance
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert_eq!(self.links(root).parent(), None, "root must not have a parent");

            let mut count = 0;
            self.assert_invariants_at(root, None, None, &mut count);
            assert_eq!(count, self.len, "tree length does not match its node count");
        }
    }

    // Checks the invariants of the subtree at `node` and returns its height.
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
        count: &mut usize,
    ) -> usize {
        unsafe {
            *count += 1;
            let key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(lower < key, "{key:?} is not greater than {lower:?}");
            }

            if let Some(upper) = upper {
                assert!(key < upper, "{key:?} is not less than {upper:?}");
            }

            let mut heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = self.links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = self
                        .links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            if self.rebalance == Rebalance::Path {
                let factor = heights[0] as isize - heights[1] as isize;
                assert!(
                    (-1..=1).contains(&factor),
                    "{key:?} has balance factor {factor}"
                );
            }

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = self.links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = self.links(cur).right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let mut cur = self.root?;

        unsafe {
            while let Some(right) = self.links(cur).right() {
                cur = right;
            }

            Some(Pin::new_unchecked(cur.as_ref()))
        }
    }

    /// Returns the height of the node corresponding to `key`, counted from the root.
    ///
    /// The root has height 1, its children height 2, and so on.
    pub fn height_of<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.node_height(node) })
    }

    /// Returns the balance factor of the node corresponding to `key`.
    ///
    /// The balance factor is the height of the left subtree minus the height of the right one.
    pub fn balance_factor_of<Q>(&self, key: &Q) -> Option<isize>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.balance_factor(node) })
    }

    /// Inserts an item into the tree.
    ///
    /// If an item with an equal key is already present the tree is left unchanged and `item` is
    /// handed back in `Err`.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe { self.links_mut(ptr).clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return Ok(());
        };

        let mut parent = root;

        // Descend the tree, looking for an empty slot.
        let dir = loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => {
                    debug!("rejecting duplicate key {:?}", unsafe { ptr.as_ref().key() });
                    return Err(unsafe { T::from_ptr(ptr) });
                }
                Ordering::Greater => Dir::Right,
            };

            match unsafe { self.links(parent).child(dir) } {
                Some(child) => parent = child,
                None => break dir,
            }
        };

        unsafe {
            self.links_mut(parent).set_child(dir, Some(ptr));
            self.links_mut(ptr).set_parent(Some(parent));
        }

        match self.rebalance {
            Rebalance::Path => self.rebalance_path(Some(parent)),
            Rebalance::RootOnly => {
                if let Some(root) = self.root {
                    unsafe { self.balance(root) };
                }
            }
        }

        self.len += 1;
        Ok(())
    }

    /// Removes the node corresponding to `key` and returns it.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let Some(node) = self.get_raw(key) else {
            debug!("no node to remove");
            return None;
        };

        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` has two children. Its successor[^1] takes its place. The successor has no left
        //    child, so unlinking it from its old slot is case 2 or 3.
        // 2. `node` has one child, which is spliced into its place.
        // 3. `node` is a leaf and simply disappears.
        //
        // Each case yields the deepest node whose subtree lost height, which is where the
        // rebalance walk starts.
        //
        // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.

        unsafe {
            let parent = self.links(node).parent();
            let left = self.links(node).left();
            let right = self.links(node).right();

            let shrunk = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = self.links(successor).right();
                        self.replace(successor, successor_right);

                        self.links_mut(successor).set_right(Some(right));
                        self.links_mut(right).set_parent(Some(successor));
                    }

                    // Right link is updated above iff succ != right.
                    self.replace(node, Some(successor));
                    self.links_mut(successor).set_left(Some(left));
                    self.links_mut(left).set_parent(Some(successor));

                    Some(successor_parent.unwrap_or(successor))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace(node, Some(child));
                    parent
                }

                (None, None) => {
                    self.replace(node, None);
                    parent
                }
            };

            self.links_mut(node).clear();
            self.len -= 1;

            if self.rebalance == Rebalance::Path {
                self.rebalance_path(shrunk);
            }

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| self.links(cur).parent());

                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Rebalancing ============================================================

    // Walks from `start` up to the root, rebalancing every node on the way.
    fn rebalance_path(&mut self, start: Link<T>) {
        let mut opt_node = start;

        while let Some(node) = opt_node {
            unsafe {
                let top = self.balance(node);
                opt_node = self.links(top).parent();
            }
        }
    }

    // Restores the balance of `node` with at most one (single or double) rotation and returns the
    // root of the resulting subtree.
    unsafe fn balance(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let factor = self.balance_factor(node);

            if factor > 1 {
                let left = self.links(node).left().expect("left-heavy node has a left child");
                let left_factor = self.balance_factor(left);

                // A balanced left child only shows up here after a removal under `Path`, where a
                // double rotation would leave the subtree unbalanced. `RootOnly` keeps the classic
                // rule and takes LR for it.
                let single = match self.rebalance {
                    Rebalance::Path => left_factor >= 0,
                    Rebalance::RootOnly => left_factor > 0,
                };

                if single {
                    self.rotate_ll(node)
                } else {
                    self.rotate_lr(node)
                }
            } else if factor < -1 {
                let right = self
                    .links(node)
                    .right()
                    .expect("right-heavy node has a right child");

                if self.balance_factor(right) > 0 {
                    self.rotate_rl(node)
                } else {
                    self.rotate_rr(node)
                }
            } else {
                node
            }
        }
    }

    unsafe fn balance_factor(&self, node: NonNull<T>) -> isize {
        unsafe {
            let left = self.subtree_height(self.links(node).left());
            let right = self.subtree_height(self.links(node).right());

            left as isize - right as isize
        }
    }

    // Returns `h(node)`, with a missing node having height 0.
    unsafe fn subtree_height(&self, node: Link<T>) -> usize {
        let Some(node) = node else {
            return 0;
        };

        unsafe {
            let left = self.subtree_height(self.links(node).left());
            let right = self.subtree_height(self.links(node).right());

            1 + left.max(right)
        }
    }

    // Returns the depth of `node`, counting itself and every ancestor.
    unsafe fn node_height(&self, node: NonNull<T>) -> usize {
        let mut height = 1;
        let mut cur = node;

        while let Some(parent) = unsafe { self.links(cur).parent() } {
            height += 1;
            cur = parent;
        }

        height
    }

    // Rotations ==============================================================
    //
    // Every rotation returns the new root of the rotated subtree and links it into the slot the
    // old root occupied, so callers never patch the grandparent themselves.

    // Lifts the left child of `parent` into its place.
    unsafe fn rotate_ll(&mut self, parent: NonNull<T>) -> NonNull<T> {
        trace!("LL rotation at {:?}", unsafe { parent.as_ref().key() });
        unsafe { self.rotate(parent, Dir::Left) }
    }

    // Lifts the right child of `parent` into its place.
    unsafe fn rotate_rr(&mut self, parent: NonNull<T>) -> NonNull<T> {
        trace!("RR rotation at {:?}", unsafe { parent.as_ref().key() });
        unsafe { self.rotate(parent, Dir::Right) }
    }

    // Lifts the right child of the left child of `parent` two levels, into `parent`'s place.
    unsafe fn rotate_lr(&mut self, parent: NonNull<T>) -> NonNull<T> {
        trace!("LR rotation at {:?}", unsafe { parent.as_ref().key() });

        unsafe {
            let pivot = self.links(parent).left().expect("LR pivot must exist");
            self.rotate_rr(pivot);
            self.rotate_ll(parent)
        }
    }

    // Lifts the left child of the right child of `parent` two levels, into `parent`'s place.
    unsafe fn rotate_rl(&mut self, parent: NonNull<T>) -> NonNull<T> {
        trace!("RL rotation at {:?}", unsafe { parent.as_ref().key() });

        unsafe {
            let pivot = self.links(parent).right().expect("RL pivot must exist");
            self.rotate_ll(pivot);
            self.rotate_rr(parent)
        }
    }

    // Performs a rotation, moving the `dir` child of `down` up into its place.
    unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = self.links(down).child(dir).expect("rotation pivot must exist");

            // - `down` becomes the `!dir` child of `up`.
            // - `across` goes from the `!dir` child of `up` to the `dir` child of `down`.
            let across = self.links(up).child(!dir);
            self.links_mut(down).set_child(dir, across);
            self.maybe_set_parent(across, Some(down));

            self.links_mut(up).set_child(!dir, Some(down));
            let parent = self.links_mut(down).set_parent(Some(up));
            self.links_mut(up).set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            up
        }
    }

    // Support methods ========================================================

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { self.links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Puts `new` in the slot `old` occupies under its parent, or makes it the root.
    //
    // `old`'s own links are not updated.
    unsafe fn replace(&mut self, old: NonNull<T>, new: Link<T>) {
        unsafe {
            let parent = self.links(old).parent();
            self.replace_child_or_set_root(parent, old, new);
            self.maybe_set_parent(new, parent);
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert_eq!(
                self.links(parent).child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );
            debug_assert!(
                new_child.is_none() || self.links(parent).child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { self.links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    #[inline]
    pub(crate) unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if the node holding these links is part of a tree with other nodes.
    pub fn is_linked(&self) -> bool {
        self.parent().is_some() || !self.is_leaf()
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .finish()
    }
}
