//! The claims / revocation / roots tree triple and the identity state it commits to.

use halo2curves_axiom::bn256::Fr;
use serde::{de, Deserialize, Deserializer, Serialize};
use zkid_common::{fr_to_decimal, is_zero, poseidon_hash, serde_fr};
use zkid_merkle::{MerkleProof, NodeReader, NodeWriter, SparseMerkleTree, TreeId};

use crate::claim::Claim;
use crate::error::{IdentityError, Result};

/// `H(claimsRoot, revocationRoot, rootsRoot)`.
pub fn identity_state(claims_root: &Fr, revocation_root: &Fr, root_of_roots: &Fr) -> Fr {
    poseidon_hash(&[*claims_root, *revocation_root, *root_of_roots])
}

/// The three roots plus the state derived from them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    #[serde(with = "serde_fr::decimal")]
    state: Fr,
    #[serde(with = "serde_fr::decimal")]
    claims_root: Fr,
    #[serde(with = "serde_fr::decimal")]
    revocation_root: Fr,
    #[serde(with = "serde_fr::decimal")]
    root_of_roots: Fr,
}

impl TreeState {
    pub fn new(claims_root: Fr, revocation_root: Fr, root_of_roots: Fr) -> Self {
        Self {
            state: identity_state(&claims_root, &revocation_root, &root_of_roots),
            claims_root,
            revocation_root,
            root_of_roots,
        }
    }

    pub fn state(&self) -> Fr {
        self.state
    }

    pub fn claims_root(&self) -> Fr {
        self.claims_root
    }

    pub fn revocation_root(&self) -> Fr {
        self.revocation_root
    }

    pub fn root_of_roots(&self) -> Fr {
        self.root_of_roots
    }
}

impl<'de> Deserialize<'de> for TreeState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            #[serde(with = "serde_fr::decimal")]
            state: Fr,
            #[serde(with = "serde_fr::decimal")]
            claims_root: Fr,
            #[serde(with = "serde_fr::decimal")]
            revocation_root: Fr,
            #[serde(with = "serde_fr::decimal")]
            root_of_roots: Fr,
        }

        let raw = Raw::deserialize(deserializer)?;
        let tree_state = TreeState::new(raw.claims_root, raw.revocation_root, raw.root_of_roots);
        if tree_state.state != raw.state {
            return Err(de::Error::custom("tree state does not match its roots"));
        }
        Ok(tree_state)
    }
}

/// Handles on the three trees of one identity.
#[derive(Clone, Copy, Debug)]
pub struct IdentityTrees {
    claims: SparseMerkleTree,
    revocations: SparseMerkleTree,
    roots: SparseMerkleTree,
}

impl Default for IdentityTrees {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityTrees {
    pub fn new() -> Self {
        Self {
            claims: SparseMerkleTree::new(TreeId::Claims),
            revocations: SparseMerkleTree::new(TreeId::Revocations),
            roots: SparseMerkleTree::new(TreeId::Roots),
        }
    }

    pub fn tree(&self, id: TreeId) -> &SparseMerkleTree {
        match id {
            TreeId::Claims => &self.claims,
            TreeId::Revocations => &self.revocations,
            TreeId::Roots => &self.roots,
        }
    }

    /// Insert `indexHash -> valueHash` and return the index hash.
    ///
    /// A non-empty claims root must already be recorded in the roots tree.
    pub fn insert_claim<W>(&self, store: &mut W, claim: &Claim) -> Result<Fr>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        let prior_root = self.claims.root(&*store)?;
        if !is_zero(&prior_root) && !self.roots.contains(&*store, &prior_root)? {
            return Err(IdentityError::InconsistentTreeState(format!(
                "claims root {} was not recorded in the roots tree before mutation",
                fr_to_decimal(&prior_root)
            )));
        }
        let (hi, hv) = claim.hi_hv();
        self.claims.add(store, hi, hv)?;
        tracing::debug!(
            index_hash = %fr_to_decimal(&hi),
            nonce = claim.revocation_nonce(),
            "inserted claim"
        );
        Ok(hi)
    }

    /// Insert `nonce -> 0` into the revocation tree.
    pub fn mark_revoked<W>(&self, store: &mut W, nonce: u64) -> Result<()>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        self.revocations.add(store, Fr::from(nonce), Fr::zero())?;
        tracing::debug!(nonce, "marked nonce revoked");
        Ok(())
    }

    /// Record `claims_root` in the roots tree. Fails with `DuplicateKey` if already recorded.
    pub fn snapshot_root<W>(&self, store: &mut W, claims_root: &Fr) -> Result<()>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        self.roots.add(store, *claims_root, Fr::zero())?;
        tracing::debug!(claims_root = %fr_to_decimal(claims_root), "recorded claims root");
        Ok(())
    }

    /// Record the current claims root unless it is empty or already recorded.
    /// Returns whether the roots tree changed.
    pub fn snapshot_current_root<W>(&self, store: &mut W) -> Result<bool>
    where
        W: NodeReader + NodeWriter + ?Sized,
    {
        let claims_root = self.claims.root(&*store)?;
        if is_zero(&claims_root) || self.roots.contains(&*store, &claims_root)? {
            return Ok(false);
        }
        self.snapshot_root(store, &claims_root)?;
        Ok(true)
    }

    pub fn current_state<R: NodeReader + ?Sized>(&self, store: &R) -> Result<TreeState> {
        Ok(TreeState::new(
            self.claims.root(store)?,
            self.revocations.root(store)?,
            self.roots.root(store)?,
        ))
    }

    /// Authentication path for a key that must exist in the current tree.
    pub fn prove_inclusion<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        tree: TreeId,
        key: &Fr,
    ) -> Result<MerkleProof> {
        self.prove_inclusion_at(store, tree, key, None)
    }

    /// As [`Self::prove_inclusion`], against a historical root.
    pub fn prove_inclusion_at<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        tree: TreeId,
        key: &Fr,
        root: Option<Fr>,
    ) -> Result<MerkleProof> {
        let (proof, _) = self.tree(tree).generate_proof(store, key, root)?;
        if !proof.existence {
            return Err(IdentityError::NotFound {
                tree,
                key: fr_to_decimal(key),
            });
        }
        Ok(proof)
    }

    /// Proof for a key expected to be absent. No membership check is made:
    /// if the key is present the returned proof is an existence proof.
    pub fn prove_non_inclusion<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        tree: TreeId,
        key: &Fr,
    ) -> Result<MerkleProof> {
        self.prove_non_inclusion_at(store, tree, key, None)
    }

    pub fn prove_non_inclusion_at<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        tree: TreeId,
        key: &Fr,
        root: Option<Fr>,
    ) -> Result<MerkleProof> {
        let (proof, _) = self.tree(tree).generate_proof(store, key, root)?;
        Ok(proof)
    }

    /// Inclusion proof of `claim` in the claims tree as of `at`.
    pub fn prove_claim<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        claim: &Claim,
        at: &TreeState,
    ) -> Result<MerkleProof> {
        self.prove_inclusion_at(store, TreeId::Claims, &claim.index_hash(), Some(at.claims_root))
    }

    /// Non-revocation proof of `nonce` as of `at`.
    pub fn prove_non_revocation<R: NodeReader + ?Sized>(
        &self,
        store: &R,
        nonce: u64,
        at: &TreeState,
    ) -> Result<MerkleProof> {
        self.prove_non_inclusion_at(
            store,
            TreeId::Revocations,
            &Fr::from(nonce),
            Some(at.revocation_root),
        )
    }
}
