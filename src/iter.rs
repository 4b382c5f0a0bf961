use crate::{AvlTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the nodes of an [`AvlTree`].
///
/// The iterator walks parent links, so it allocates nothing and yields nodes in ascending key
/// order.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    cur: Link<T>,
    from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            cur: tree.root,
            from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.cur?;

        loop {
            match self.from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    while let Some(left) = unsafe { self.tree.links(cur).left() } {
                        cur = left;
                    }

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next.
                    self.cur = Some(cur);
                    self.from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    if let Some(right) = unsafe { self.tree.links(cur).right() } {
                        self.from = CameFrom::Parent;
                        cur = right;
                    } else if let Some(parent) = unsafe { self.tree.links(cur).parent() } {
                        self.from = match unsafe { self.tree.which_child(parent, cur) } {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        // A right child's parent was yielded already; `RightChild` keeps
                        // climbing from it.
                        cur = parent;
                    } else {
                        unreachable!("the last node was already yielded")
                    }
                }

                CameFrom::RightChild => {
                    // The subtree at `cur` is exhausted. The successor is the first ancestor
                    // reached from its left child.
                    loop {
                        let parent = unsafe { self.tree.links(cur).parent() }
                            .expect("the last node was already yielded");
                        let dir = unsafe { self.tree.which_child(parent, cur) };

                        cur = parent;

                        if dir == Dir::Left {
                            break;
                        }
                    }

                    self.from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns an iterator over the nodes of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
