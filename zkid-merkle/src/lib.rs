//! Sparse Merkle trees for identity state.
//!
//! A [`SparseMerkleTree`] is a stateless handle on one of the three identity
//! tree namespaces. Nodes live in a [`Storage`] backend and are only written
//! through a [`Transaction`], so a multi-tree update either lands as a whole
//! or not at all.

pub mod error;
pub mod memory;
pub mod node;
pub mod proof;
pub mod sled_store;
pub mod storage;
pub mod tree;

pub use error::{MerkleError, StorageError};
pub use memory::MemoryStorage;
pub use node::{Node, TreeId};
pub use proof::{verify_proof, AuxInputs, MerkleProof, NodeAux, CIRCUIT_MT_LEVELS};
pub use sled_store::SledStorage;
pub use storage::{NodeReader, NodeWriter, Storage, Transaction, WriteBatch};
pub use tree::{SparseMerkleTree, MAX_LEVELS};
