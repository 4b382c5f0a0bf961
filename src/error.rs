use thiserror::Error;

/// Errors returned by the mutating operations of [`AvlSet`](crate::AvlSet).
///
/// Both variants carry the key involved. A failed operation leaves the tree unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError<K> {
    #[error("the node with {0:?} already exists; will not add it to the tree")]
    DuplicateKey(K),
    #[error("the node {0:?} does not exist; will not remove it")]
    KeyNotFound(K),
}

impl<K> TreeError<K> {
    /// Returns the key the failed operation was called with.
    pub fn key(&self) -> &K {
        match self {
            TreeError::DuplicateKey(key) | TreeError::KeyNotFound(key) => key,
        }
    }

    /// Consumes the error, returning the key the failed operation was called with.
    pub fn into_key(self) -> K {
        match self {
            TreeError::DuplicateKey(key) | TreeError::KeyNotFound(key) => key,
        }
    }
}
