//! sled-backed node store.
//!
//! All three trees share one sled tree. Keys are `[prefix, b'n', hash]` for
//! nodes and `[prefix, b'r']` for the current root, so a whole transaction is
//! a single `apply_batch` on one tree.

use std::path::Path;
use std::sync::Arc;

use halo2curves_axiom::bn256::Fr;
use sled::Db;
use zkid_common::{fr_from_bytes, fr_to_bytes};

use crate::error::StorageError;
use crate::node::{Node, TreeId};
use crate::storage::{Storage, WriteBatch};

const NODES_TREE: &str = "mt_nodes";
const NODE_TAG: u8 = b'n';
const ROOT_TAG: u8 = b'r';

#[derive(Clone)]
pub struct SledStorage {
    db: Arc<Db>,
    nodes: sled::Tree,
}

impl SledStorage {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = sled::open(path_ref)?;
        tracing::debug!(path = %path_ref.display(), "opened sled node store");
        Self::from_db(db)
    }

    /// Throwaway store that is removed when dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let nodes = db.open_tree(NODES_TREE)?;
        Ok(Self {
            db: Arc::new(db),
            nodes,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn node_key(tree: TreeId, hash: &Fr) -> [u8; 34] {
    let mut key = [0u8; 34];
    key[0] = tree.prefix();
    key[1] = NODE_TAG;
    key[2..].copy_from_slice(&fr_to_bytes(hash));
    key
}

fn root_key(tree: TreeId) -> [u8; 2] {
    [tree.prefix(), ROOT_TAG]
}

impl Storage for SledStorage {
    fn get_node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError> {
        match self.nodes.get(node_key(tree, hash))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_root(&self, tree: TreeId) -> Result<Option<Fr>, StorageError> {
        let Some(bytes) = self.nodes.get(root_key(tree))? else {
            return Ok(None);
        };
        let raw: [u8; 32] = bytes.as_ref().try_into().map_err(|_| {
            StorageError::Codec(format!(
                "root record for the {} tree has {} bytes",
                tree,
                bytes.len()
            ))
        })?;
        fr_from_bytes(&raw)
            .map(Some)
            .map_err(|err| StorageError::Codec(err.to_string()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut sled_batch = sled::Batch::default();
        for (tree, node) in &batch.nodes {
            let value = serde_json::to_vec(node)?;
            sled_batch.insert(&node_key(*tree, &node.hash())[..], value);
        }
        for (tree, root) in &batch.roots {
            sled_batch.insert(&root_key(*tree)[..], &fr_to_bytes(root)[..]);
        }
        self.nodes.apply_batch(sled_batch)?;
        self.nodes.flush()?;
        Ok(())
    }
}
