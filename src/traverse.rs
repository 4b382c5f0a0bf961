use core::ptr::NonNull;

use crate::{AvlTree, Link, Links, TreeNode};

/// The order in which [`AvlTree::traverse`] visits nodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TraversalOrder {
    /// Node, then left subtree, then right subtree.
    PreOrder,
    /// Left subtree, then node, then right subtree. Yields ascending keys.
    InOrder,
    /// Left subtree, then right subtree, then node.
    PostOrder,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Collects every node of the tree in the given order.
    pub fn traverse(&self, order: TraversalOrder) -> Vec<&T> {
        self.traverse_raw(order)
            .into_iter()
            .map(|node| unsafe { node.as_ref() })
            .collect()
    }

    /// Returns the height of the tree, counted in nodes along the longest root-to-leaf path.
    ///
    /// This is the greatest [`height_of`](AvlTree::height_of) over all nodes, or 0 for an empty
    /// tree.
    pub fn tree_height(&self) -> usize {
        self.traverse_raw(TraversalOrder::PreOrder)
            .into_iter()
            .map(|node| unsafe { self.node_height(node) })
            .max()
            .unwrap_or(0)
    }

    fn traverse_raw(&self, order: TraversalOrder) -> Vec<NonNull<T>> {
        let mut nodes = Vec::with_capacity(self.len());
        unsafe { self.walk(self.root, order, &mut nodes) };

        debug_assert_eq!(nodes.len(), self.len());
        nodes
    }

    unsafe fn walk(&self, link: Link<T>, order: TraversalOrder, out: &mut Vec<NonNull<T>>) {
        let Some(node) = link else {
            return;
        };

        unsafe {
            let left = self.links(node).left();
            let right = self.links(node).right();

            match order {
                TraversalOrder::PreOrder => {
                    out.push(node);
                    self.walk(left, order, out);
                    self.walk(right, order, out);
                }
                TraversalOrder::InOrder => {
                    self.walk(left, order, out);
                    out.push(node);
                    self.walk(right, order, out);
                }
                TraversalOrder::PostOrder => {
                    self.walk(left, order, out);
                    self.walk(right, order, out);
                    out.push(node);
                }
            }
        }
    }
}
