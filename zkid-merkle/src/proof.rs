//! Inclusion / non-inclusion proofs and their verification.

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkid_common::{fr_bit, fr_to_decimal, serde_fr};

use crate::error::MerkleError;
use crate::node::{leaf_hash, middle_hash};

/// Sibling count the downstream proof system expects for every path.
pub const CIRCUIT_MT_LEVELS: usize = 40;

/// Leaf found where a non-inclusion walk diverged from the queried key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    #[serde(with = "serde_fr::decimal")]
    pub key: Fr,
    #[serde(with = "serde_fr::decimal")]
    pub value: Fr,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub existence: bool,
    /// Siblings ordered from the root downwards. Empty siblings are kept as zero.
    #[serde(with = "serde_fr::decimal_vec")]
    pub siblings: Vec<Fr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_aux: Option<NodeAux>,
}

/// Auxiliary-node triple as consumed by the proof system: `(key, value, noAux)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxInputs {
    pub key: Fr,
    pub value: Fr,
    pub no_aux: bool,
}

impl AuxInputs {
    pub fn no_aux_flag(&self) -> &'static str {
        if self.no_aux {
            "1"
        } else {
            "0"
        }
    }
}

impl MerkleProof {
    pub fn inclusion(siblings: Vec<Fr>) -> Self {
        Self {
            existence: true,
            siblings,
            node_aux: None,
        }
    }

    pub fn non_inclusion(siblings: Vec<Fr>, node_aux: Option<NodeAux>) -> Self {
        Self {
            existence: false,
            siblings,
            node_aux,
        }
    }

    /// Siblings padded with zeros (or truncated) to exactly `levels` entries.
    pub fn padded_siblings(&self, levels: usize) -> Vec<Fr> {
        let mut siblings = self.siblings.clone();
        siblings.resize(levels, Fr::zero());
        siblings
    }

    /// Padded siblings as decimal strings, the form the proof inputs carry.
    pub fn siblings_decimal(&self, levels: usize) -> Vec<String> {
        self.padded_siblings(levels)
            .iter()
            .map(fr_to_decimal)
            .collect()
    }

    /// Zero key/value with the flag set when there is no auxiliary leaf.
    pub fn aux_inputs(&self) -> AuxInputs {
        match self.node_aux {
            Some(aux) => AuxInputs {
                key: aux.key,
                value: aux.value,
                no_aux: false,
            },
            None => AuxInputs {
                key: Fr::zero(),
                value: Fr::zero(),
                no_aux: true,
            },
        }
    }

    /// Root implied by this proof for `key` (and `value`, for existence proofs).
    pub fn root_from_proof(&self, key: &Fr, value: &Fr) -> Result<Fr, MerkleError> {
        let mut mid = if self.existence {
            leaf_hash(key, value)
        } else {
            match self.node_aux {
                None => Fr::zero(),
                Some(aux) if aux.key == *key => {
                    return Err(MerkleError::InvalidProof(format!(
                        "auxiliary leaf shares the queried key {}",
                        fr_to_decimal(key)
                    )));
                }
                Some(aux) => leaf_hash(&aux.key, &aux.value),
            }
        };

        for (lvl, sibling) in self.siblings.iter().enumerate().rev() {
            mid = if fr_bit(key, lvl) {
                middle_hash(sibling, &mid)
            } else {
                middle_hash(&mid, sibling)
            };
        }
        Ok(mid)
    }
}

/// Check `proof` for `key` against `root`. Malformed proofs verify as false.
pub fn verify_proof(root: &Fr, proof: &MerkleProof, key: &Fr, value: &Fr) -> bool {
    match proof.root_from_proof(key, value) {
        Ok(computed) => computed == *root,
        Err(err) => {
            tracing::debug!(error = %err, "rejected merkle proof");
            false
        }
    }
}
