//! Fixed-depth sparse Merkle tree over an injected node store.
//!
//! The path to a key is the sequence of its little-endian bits, bit 0 picking
//! the child of the root. A leaf sits at the shallowest level where its path
//! no longer collides with any other leaf; inserting a leaf whose path shares
//! a prefix with an existing one pushes both down until their bits diverge.

use halo2curves_axiom::bn256::Fr;
use zkid_common::{fr_bit, fr_to_decimal};

use crate::error::MerkleError;
use crate::node::{Node, TreeId};
use crate::proof::{MerkleProof, NodeAux};
use crate::storage::{NodeReader, NodeWriter};

pub const MAX_LEVELS: usize = 32;

/// Handle on one tree namespace. Holds no nodes itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SparseMerkleTree {
    tree: TreeId,
    max_levels: usize,
}

impl SparseMerkleTree {
    pub fn new(tree: TreeId) -> Self {
        Self::with_max_levels(tree, MAX_LEVELS)
    }

    pub fn with_max_levels(tree: TreeId, max_levels: usize) -> Self {
        Self { tree, max_levels }
    }

    pub fn id(&self) -> TreeId {
        self.tree
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn root<R: NodeReader + ?Sized>(&self, store: &R) -> Result<Fr, MerkleError> {
        Ok(store.root(self.tree)?)
    }

    /// Insert `key -> value` and return the new root.
    pub fn add<W>(&self, store: &mut W, key: Fr, value: Fr) -> Result<Fr, MerkleError>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        let root = store.root(self.tree)?;
        let new_root = self.add_leaf(store, Node::leaf(key, value), &key, root, 0)?;
        store.set_root(self.tree, new_root);
        tracing::debug!(
            tree = %self.tree,
            key = %fr_to_decimal(&key),
            root = %fr_to_decimal(&new_root),
            "added leaf"
        );
        Ok(new_root)
    }

    /// Value stored under `key` in the current tree.
    pub fn get<R: NodeReader + ?Sized>(&self, store: &R, key: &Fr) -> Result<Fr, MerkleError> {
        let (proof, value) = self.generate_proof(store, key, None)?;
        if proof.existence {
            Ok(value)
        } else {
            Err(self.not_found(key))
        }
    }

    pub fn contains<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        key: &Fr,
    ) -> Result<bool, MerkleError> {
        let (proof, _) = self.generate_proof(store, key, None)?;
        Ok(proof.existence)
    }

    /// Proof for `key` against `root` (the current root when `None`), plus the
    /// stored value when the key exists (zero otherwise).
    ///
    /// Any root the tree has ever held can be used: nodes are never removed.
    pub fn generate_proof<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        key: &Fr,
        root: Option<Fr>,
    ) -> Result<(MerkleProof, Fr), MerkleError> {
        let mut next = match root {
            Some(root) => root,
            None => store.root(self.tree)?,
        };
        let mut siblings = Vec::new();

        for lvl in 0..self.max_levels {
            match store.load(self.tree, &next)? {
                Node::Empty => return Ok((MerkleProof::non_inclusion(siblings, None), Fr::zero())),
                Node::Leaf { key: leaf_key, value } => {
                    if leaf_key == *key {
                        return Ok((MerkleProof::inclusion(siblings), value));
                    }
                    let aux = NodeAux {
                        key: leaf_key,
                        value,
                    };
                    return Ok((MerkleProof::non_inclusion(siblings, Some(aux)), Fr::zero()));
                }
                Node::Middle { left, right } => {
                    if fr_bit(key, lvl) {
                        siblings.push(left);
                        next = right;
                    } else {
                        siblings.push(right);
                        next = left;
                    }
                }
            }
        }

        Err(self.reached_max_level())
    }

    fn add_leaf<W>(
        &self,
        store: &mut W,
        new_leaf: Node,
        key: &Fr,
        node_hash: Fr,
        lvl: usize,
    ) -> Result<Fr, MerkleError>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        if lvl + 1 > self.max_levels {
            return Err(self.reached_max_level());
        }
        match store.load(self.tree, &node_hash)? {
            Node::Empty => Ok(store.put_node(self.tree, new_leaf)),
            old @ Node::Leaf { key: old_key, .. } => {
                if old_key == *key {
                    return Err(MerkleError::DuplicateKey {
                        tree: self.tree,
                        key: fr_to_decimal(key),
                    });
                }
                self.push_leaf(store, new_leaf, key, old, &old_key, lvl)
            }
            Node::Middle { left, right } => {
                let middle = if fr_bit(key, lvl) {
                    let child = self.add_leaf(store, new_leaf, key, right, lvl + 1)?;
                    Node::middle(left, child)
                } else {
                    let child = self.add_leaf(store, new_leaf, key, left, lvl + 1)?;
                    Node::middle(child, right)
                };
                Ok(store.put_node(self.tree, middle))
            }
        }
    }

    fn push_leaf<W>(
        &self,
        store: &mut W,
        new_leaf: Node,
        new_key: &Fr,
        old_leaf: Node,
        old_key: &Fr,
        lvl: usize,
    ) -> Result<Fr, MerkleError>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        if lvl + 2 > self.max_levels {
            return Err(self.reached_max_level());
        }
        let new_bit = fr_bit(new_key, lvl);
        if new_bit == fr_bit(old_key, lvl) {
            let child = self.push_leaf(store, new_leaf, new_key, old_leaf, old_key, lvl + 1)?;
            let middle = if new_bit {
                Node::middle(Fr::zero(), child)
            } else {
                Node::middle(child, Fr::zero())
            };
            return Ok(store.put_node(self.tree, middle));
        }

        let old_hash = old_leaf.hash();
        let new_hash = store.put_node(self.tree, new_leaf);
        let middle = if new_bit {
            Node::middle(old_hash, new_hash)
        } else {
            Node::middle(new_hash, old_hash)
        };
        Ok(store.put_node(self.tree, middle))
    }

    fn not_found(&self, key: &Fr) -> MerkleError {
        MerkleError::NotFound {
            tree: self.tree,
            key: fr_to_decimal(key),
        }
    }

    fn reached_max_level(&self) -> MerkleError {
        MerkleError::ReachedMaxLevel {
            tree: self.tree,
            max_levels: self.max_levels,
        }
    }
}
