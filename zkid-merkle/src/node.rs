//! Tree identifiers and node types.

use std::fmt;

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkid_common::{poseidon_hash, serde_fr};

/// Namespace of one of the three identity trees inside a shared store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeId {
    Claims,
    Revocations,
    Roots,
}

impl TreeId {
    pub const ALL: [TreeId; 3] = [TreeId::Claims, TreeId::Revocations, TreeId::Roots];

    /// Single-byte key prefix used by byte-oriented backends.
    pub fn prefix(self) -> u8 {
        match self {
            TreeId::Claims => 1,
            TreeId::Revocations => 2,
            TreeId::Roots => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TreeId::Claims => "claims",
            TreeId::Revocations => "revocations",
            TreeId::Roots => "roots",
        }
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sparse Merkle tree node. Nodes are addressed by their own hash.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Empty,
    Leaf {
        #[serde(with = "serde_fr::hex")]
        key: Fr,
        #[serde(with = "serde_fr::hex")]
        value: Fr,
    },
    Middle {
        #[serde(with = "serde_fr::hex")]
        left: Fr,
        #[serde(with = "serde_fr::hex")]
        right: Fr,
    },
}

impl Node {
    pub fn leaf(key: Fr, value: Fr) -> Self {
        Node::Leaf { key, value }
    }

    pub fn middle(left: Fr, right: Fr) -> Self {
        Node::Middle { left, right }
    }

    /// Node hash: zero for empty, `H(key, value, 1)` for leaves, `H(left, right)` for middles.
    pub fn hash(&self) -> Fr {
        match self {
            Node::Empty => Fr::zero(),
            Node::Leaf { key, value } => leaf_hash(key, value),
            Node::Middle { left, right } => middle_hash(left, right),
        }
    }
}

pub fn leaf_hash(key: &Fr, value: &Fr) -> Fr {
    poseidon_hash(&[*key, *value, Fr::one()])
}

pub fn middle_hash(left: &Fr, right: &Fr) -> Fr {
    poseidon_hash(&[*left, *right])
}
