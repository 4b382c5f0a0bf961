/// How far a tree looks for imbalance after it is modified.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rebalance {
    /// Rebalance every node from the modified position up to the root, after both insertions and
    /// removals. Keeps every balance factor within -1..=1.
    #[default]
    Path,

    /// Rebalance only the root, and only after insertions.
    ///
    /// Imbalance below the root is left in place, so the tree may degrade towards a list on
    /// adversarial input. Useful to reproduce shapes built by the classic root-only algorithm.
    RootOnly,
}
