use core::fmt;

use crate::{AvlTree, Links, TreeNode};

/// Renders an [`AvlTree`] the way the `tree` command renders directories.
///
/// The root key sits on the first line. Each node's right child is printed before its left child,
/// right children behind `├── ` and left children behind `└── `:
///
/// ```text
/// 5
/// ├── 8
/// └── 3
/// ```
///
/// Returned by [`AvlTree::display`].
pub struct Visualize<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree AvlTree<T>,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Returns a value that renders the tree as text when formatted with `{}`.
    pub fn display(&self) -> Visualize<'_, T> {
        Visualize { tree: self }
    }

    /// Renders the tree as text, one key per line.
    ///
    /// See [`Visualize`] for the layout. An empty tree renders as an empty string.
    pub fn visualize(&self) -> String {
        self.display().to_string()
    }
}

impl<T> fmt::Display for Visualize<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.tree.root else {
            return Ok(());
        };

        unsafe {
            writeln!(f, "{}", root.as_ref().key())?;
            self.branches(f, root.as_ref(), &mut String::new())
        }
    }
}

impl<T> Visualize<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    // Writes the children of `node`, each line starting with `prefix`.
    //
    // `prefix` is restored to its original contents before returning.
    fn branches(&self, f: &mut fmt::Formatter<'_>, node: &T, prefix: &mut String) -> fmt::Result {
        let links = unsafe { self.tree.links(node.into()) };

        for (child, branch, indent) in [
            (links.right(), "├── ", "│   "),
            (links.left(), "└── ", "    "),
        ] {
            let Some(child) = child else {
                continue;
            };

            let child = unsafe { child.as_ref() };
            writeln!(f, "{prefix}{branch}{}", child.key())?;

            let len = prefix.len();
            prefix.push_str(indent);
            self.branches(f, child, prefix)?;
            prefix.truncate(len);
        }

        Ok(())
    }
}
