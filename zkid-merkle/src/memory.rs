use std::collections::HashMap;
use std::sync::RwLock;

use halo2curves_axiom::bn256::Fr;
use zkid_common::fr_to_bytes;

use crate::error::StorageError;
use crate::node::{Node, TreeId};
use crate::storage::{Storage, WriteBatch};

#[derive(Default)]
struct Inner {
    nodes: HashMap<(TreeId, [u8; 32]), Node>,
    roots: HashMap<TreeId, Fr>,
}

/// In-process node store. Batches are applied under a single write lock.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self, tree: TreeId) -> Result<usize, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.nodes.keys().filter(|(t, _)| *t == tree).count())
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("memory storage lock poisoned".into())
}

impl Storage for MemoryStorage {
    fn get_node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.nodes.get(&(tree, fr_to_bytes(hash))).copied())
    }

    fn get_root(&self, tree: TreeId) -> Result<Option<Fr>, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.roots.get(&tree).copied())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        for (tree, node) in batch.nodes {
            inner.nodes.insert((tree, fr_to_bytes(&node.hash())), node);
        }
        for (tree, root) in batch.roots {
            inner.roots.insert(tree, root);
        }
        Ok(())
    }
}
