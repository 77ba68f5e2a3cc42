//! Error types for identity operations.

use thiserror::Error;
use zkid_merkle::{MerkleError, StorageError, TreeId};

/// Error type for identity state operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Malformed claim fields, identifiers, keys or schema mismatches.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("key {key} already present in the {tree} tree")]
    DuplicateKey { tree: TreeId, key: String },

    #[error("key {key} not found in the {tree} tree")]
    NotFound { tree: TreeId, key: String },

    #[error("inconsistent tree state: {0}")]
    InconsistentTreeState(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<MerkleError> for IdentityError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::DuplicateKey { tree, key } => IdentityError::DuplicateKey { tree, key },
            MerkleError::NotFound { tree, key } => IdentityError::NotFound { tree, key },
            MerkleError::ReachedMaxLevel { tree, max_levels } => IdentityError::Encoding(format!(
                "key path in the {} tree exceeds {} levels",
                tree, max_levels
            )),
            MerkleError::InvalidProof(msg) => IdentityError::InconsistentTreeState(msg),
            MerkleError::Storage(err) => IdentityError::Storage(err),
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
