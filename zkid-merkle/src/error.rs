//! Error types for the tree engine and its storage backends.

use thiserror::Error;

use crate::node::TreeId;

/// Failure reported by a node store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage codec error: {0}")]
    Codec(String),

    /// A middle node references a child the store does not hold.
    #[error("node {hash} missing from the {tree} tree")]
    MissingNode { tree: TreeId, hash: String },

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Error type for sparse Merkle tree operations.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("key {key} already exists in the {tree} tree")]
    DuplicateKey { tree: TreeId, key: String },

    #[error("key {key} not found in the {tree} tree")]
    NotFound { tree: TreeId, key: String },

    #[error("reached the maximum depth of {max_levels} levels in the {tree} tree")]
    ReachedMaxLevel { tree: TreeId, max_levels: usize },

    #[error("invalid merkle proof: {0}")]
    InvalidProof(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
