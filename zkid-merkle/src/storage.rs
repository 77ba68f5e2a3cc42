//! Node store capability and the transactional overlay the tree writes through.
//!
//! A [`Storage`] backend holds the nodes and current roots of all three
//! identity trees, isolated by [`TreeId`]. Trees never write to a backend
//! directly: mutations are staged in a [`Transaction`] and land in one atomic
//! [`Storage::apply`] call on commit.

use std::collections::HashMap;
use std::sync::Arc;

use halo2curves_axiom::bn256::Fr;
use zkid_common::{fr_to_bytes, is_zero};

use crate::error::StorageError;
use crate::node::{Node, TreeId};

/// Everything a transaction staged, applied atomically by the backend.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    pub nodes: Vec<(TreeId, Node)>,
    pub roots: Vec<(TreeId, Fr)>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.roots.is_empty()
    }
}

/// Persistent backend for tree nodes and roots.
pub trait Storage: Send + Sync {
    /// Look up a node by hash within one tree's namespace.
    fn get_node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError>;

    /// Current root of a tree, `None` if the tree was never written.
    fn get_root(&self, tree: TreeId) -> Result<Option<Fr>, StorageError>;

    /// Apply a batch atomically: either every node and root lands or none does.
    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get_node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError> {
        (**self).get_node(tree, hash)
    }

    fn get_root(&self, tree: TreeId) -> Result<Option<Fr>, StorageError> {
        (**self).get_root(tree)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        (**self).apply(batch)
    }
}

/// Read access the tree algorithms need.
pub trait NodeReader {
    fn node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError>;

    fn root(&self, tree: TreeId) -> Result<Fr, StorageError>;

    /// Resolve a hash to its node. The zero hash is always the empty node.
    fn load(&self, tree: TreeId, hash: &Fr) -> Result<Node, StorageError> {
        if is_zero(hash) {
            return Ok(Node::Empty);
        }
        self.node(tree, hash)?
            .ok_or_else(|| StorageError::MissingNode {
                tree,
                hash: zkid_common::fr_to_decimal(hash),
            })
    }
}

/// Write access the tree algorithms need.
pub trait NodeWriter {
    /// Store a node and return its hash.
    fn put_node(&mut self, tree: TreeId, node: Node) -> Fr;

    fn set_root(&mut self, tree: TreeId, root: Fr);
}

impl<S: Storage + ?Sized> NodeReader for S {
    fn node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError> {
        self.get_node(tree, hash)
    }

    fn root(&self, tree: TreeId) -> Result<Fr, StorageError> {
        Ok(self.get_root(tree)?.unwrap_or_else(Fr::zero))
    }
}

/// Staged writes over a borrowed backend.
///
/// Reads see staged nodes and roots first. Nothing reaches the backend until
/// [`Transaction::commit`]; dropping the transaction discards the staged state.
pub struct Transaction<'a, S: Storage + ?Sized> {
    storage: &'a S,
    nodes: HashMap<(TreeId, [u8; 32]), Node>,
    roots: HashMap<TreeId, Fr>,
    order: Vec<(TreeId, [u8; 32])>,
}

impl<'a, S: Storage + ?Sized> Transaction<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            nodes: HashMap::new(),
            roots: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    /// Number of nodes staged so far.
    pub fn staged_nodes(&self) -> usize {
        self.order.len()
    }

    pub fn into_batch(mut self) -> WriteBatch {
        let mut batch = WriteBatch::default();
        for key in self.order.drain(..) {
            if let Some(node) = self.nodes.remove(&key) {
                batch.nodes.push((key.0, node));
            }
        }
        for tree in TreeId::ALL {
            if let Some(root) = self.roots.get(&tree) {
                batch.roots.push((tree, *root));
            }
        }
        batch
    }

    pub fn commit(self) -> Result<(), StorageError> {
        let storage = self.storage;
        let batch = self.into_batch();
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            nodes = batch.nodes.len(),
            roots = batch.roots.len(),
            "committing tree transaction"
        );
        storage.apply(batch)
    }
}

impl<S: Storage + ?Sized> NodeReader for Transaction<'_, S> {
    fn node(&self, tree: TreeId, hash: &Fr) -> Result<Option<Node>, StorageError> {
        if let Some(node) = self.nodes.get(&(tree, fr_to_bytes(hash))) {
            return Ok(Some(*node));
        }
        self.storage.get_node(tree, hash)
    }

    fn root(&self, tree: TreeId) -> Result<Fr, StorageError> {
        match self.roots.get(&tree) {
            Some(root) => Ok(*root),
            None => NodeReader::root(self.storage, tree),
        }
    }
}

impl<S: Storage + ?Sized> NodeWriter for Transaction<'_, S> {
    fn put_node(&mut self, tree: TreeId, node: Node) -> Fr {
        let hash = node.hash();
        if matches!(node, Node::Empty) {
            return hash;
        }
        let key = (tree, fr_to_bytes(&hash));
        if self.nodes.insert(key, node).is_none() {
            self.order.push(key);
        }
        hash
    }

    fn set_root(&mut self, tree: TreeId, root: Fr) {
        self.roots.insert(tree, root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    #[test]
    fn reads_see_staged_writes() {
        let storage = MemoryStorage::new();
        let mut tx = Transaction::new(&storage);
        let node = Node::leaf(Fr::from(1u64), Fr::from(2u64));
        let hash = tx.put_node(TreeId::Claims, node);
        tx.set_root(TreeId::Claims, hash);

        assert_eq!(tx.node(TreeId::Claims, &hash).unwrap(), Some(node));
        assert_eq!(NodeReader::root(&tx, TreeId::Claims).unwrap(), hash);
        assert_eq!(storage.get_node(TreeId::Claims, &hash).unwrap(), None);
        assert_eq!(storage.get_root(TreeId::Claims).unwrap(), None);
    }

    #[test]
    fn dropped_transaction_discards_writes() {
        let storage = MemoryStorage::new();
        {
            let mut tx = Transaction::new(&storage);
            let hash = tx.put_node(TreeId::Roots, Node::leaf(Fr::from(5u64), Fr::zero()));
            tx.set_root(TreeId::Roots, hash);
        }
        assert_eq!(NodeReader::root(&storage, TreeId::Roots).unwrap(), Fr::zero());
    }

    #[test]
    fn namespaces_are_isolated() {
        let storage = MemoryStorage::new();
        let mut tx = Transaction::new(&storage);
        let hash = tx.put_node(TreeId::Claims, Node::leaf(Fr::from(7u64), Fr::from(8u64)));
        tx.commit().unwrap();

        assert!(storage.get_node(TreeId::Claims, &hash).unwrap().is_some());
        assert!(storage.get_node(TreeId::Revocations, &hash).unwrap().is_none());
    }

    #[test]
    fn load_reports_missing_nodes() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load(TreeId::Claims, &Fr::zero()).unwrap(), Node::Empty);
        let err = storage.load(TreeId::Claims, &Fr::from(99u64)).unwrap_err();
        assert!(matches!(err, StorageError::MissingNode { tree: TreeId::Claims, .. }));
    }
}
