//! Error type shared by split extraction, the assignment solver and the
//! distance functions.

use phylotree::tree::TreeError;
use thiserror::Error;

/// Errors reported by the distance core.
///
/// Every check happens before any computation starts, so an operation either
/// fully succeeds or returns exactly one of these.
#[derive(Error, Debug)]
pub enum DistanceError {
    /// The two operands were built over different numbers of tips.
    #[error("Universe size mismatch: {left} tips vs {right} tips")]
    SizeMismatch { left: usize, right: usize },
    /// A cost matrix (or another numeric input) is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A leaf carries no label, so it cannot be given a tip index.
    #[error("All leaf nodes must be named")]
    UnnamedLeaf,
    /// A leaf label is absent from the tip index the tree is built against.
    #[error("Tip '{0}' is not part of the tip index")]
    UnknownTip(String),
    /// The tree model failed while being traversed.
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}

/// Fails with [`DistanceError::SizeMismatch`] unless both universes agree.
pub(crate) fn ensure_same_size(left: usize, right: usize) -> Result<(), DistanceError> {
    if left == right {
        Ok(())
    } else {
        Err(DistanceError::SizeMismatch { left, right })
    }
}
