//! Genesis: the authentication claim, the first tree state and the identifier.

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkid_common::fr_to_decimal;
use zkid_merkle::{verify_proof, MerkleProof, NodeReader, NodeWriter};

use crate::claim::{Claim, ClaimOptions};
use crate::error::{IdentityError, Result};
use crate::id::{IdType, Identifier};
use crate::keys::PublicKey;
use crate::schema::SchemaHash;
use crate::trees::{IdentityTrees, TreeState};

/// Revocation nonce of the authentication claim created at genesis.
pub const AUTH_CLAIM_NONCE: u64 = 1;

/// Claim binding `(pubKey.x, pubKey.y)` to the identity under the auth schema.
pub fn auth_claim(public_key: &PublicKey, revocation_nonce: u64) -> Result<Claim> {
    let options = ClaimOptions::new(revocation_nonce)
        .with_index_data([public_key.x(), public_key.y()]);
    Claim::new(SchemaHash::auth(), &options)
}

/// Identifier and genesis state, fixed for the life of the identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    id: Identifier,
    genesis_state: TreeState,
    auth_nonce: u64,
}

impl Identity {
    pub fn new(id_type: IdType, genesis_state: TreeState, auth_nonce: u64) -> Self {
        Self {
            id: Identifier::from_genesis_state(id_type, &genesis_state.state()),
            genesis_state,
            auth_nonce,
        }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn genesis_state(&self) -> &TreeState {
        &self.genesis_state
    }

    pub fn auth_nonce(&self) -> u64 {
        self.auth_nonce
    }

    /// Whether `state` is this identity's genesis state.
    pub fn is_genesis(&self, state: &TreeState) -> bool {
        state.state() == self.genesis_state.state()
    }

    /// Re-derive the identifier from the recorded genesis state.
    pub fn check(&self) -> Result<()> {
        if !self.id.matches_genesis_state(&self.genesis_state.state()) {
            return Err(IdentityError::InconsistentTreeState(format!(
                "identifier {} was not derived from genesis state {}",
                self.id,
                fr_to_decimal(&self.genesis_state.state())
            )));
        }
        Ok(())
    }
}

/// The auth claim with its inclusion and non-revocation proofs at one tree state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMaterial {
    pub claim: Claim,
    pub tree_state: TreeState,
    pub inclusion: MerkleProof,
    pub non_revocation: MerkleProof,
}

impl AuthMaterial {
    /// Evaluate both proofs for `claim` at `at`.
    pub fn at<R: NodeReader + ?Sized>(
        trees: &IdentityTrees,
        store: &R,
        claim: &Claim,
        at: &TreeState,
    ) -> Result<Self> {
        Ok(Self {
            claim: *claim,
            tree_state: *at,
            inclusion: trees.prove_claim(store, claim, at)?,
            non_revocation: trees.prove_non_revocation(store, claim.revocation_nonce(), at)?,
        })
    }

    /// The claim is the auth claim of `public_key`.
    pub fn is_bound_to(&self, public_key: &PublicKey) -> bool {
        matches!(
            auth_claim(public_key, self.claim.revocation_nonce()),
            Ok(expected) if expected == self.claim
        )
    }

    /// Both proofs verify against the recorded tree state and the claim is not revoked.
    pub fn verify(&self) -> bool {
        let (hi, hv) = self.claim.hi_hv();
        let nonce = Fr::from(self.claim.revocation_nonce());
        self.inclusion.existence
            && verify_proof(&self.tree_state.claims_root(), &self.inclusion, &hi, &hv)
            && !self.non_revocation.existence
            && verify_proof(
                &self.tree_state.revocation_root(),
                &self.non_revocation,
                &nonce,
                &Fr::zero(),
            )
    }
}

/// Output of [`genesis`].
#[derive(Clone, Debug)]
pub struct Genesis {
    pub identity: Identity,
    pub tree_state: TreeState,
    pub auth: AuthMaterial,
}

/// Create an identity on empty trees: insert the auth claim and derive the identifier.
pub fn genesis<W>(
    trees: &IdentityTrees,
    store: &mut W,
    public_key: &PublicKey,
    revocation_nonce: u64,
) -> Result<Genesis>
where
    W: NodeReader + NodeWriter + ?Sized,
{
    let empty = TreeState::new(Fr::zero(), Fr::zero(), Fr::zero());
    if trees.current_state(&*store)? != empty {
        return Err(IdentityError::InconsistentTreeState(
            "genesis requires empty trees".into(),
        ));
    }

    let claim = auth_claim(public_key, revocation_nonce)?;
    trees.insert_claim(store, &claim)?;

    let tree_state = trees.current_state(&*store)?;
    let identity = Identity::new(IdType::DEFAULT, tree_state, revocation_nonce);
    let auth = AuthMaterial::at(trees, &*store, &claim, &tree_state)?;

    tracing::info!(
        id = %identity.id(),
        genesis_state = %fr_to_decimal(&tree_state.state()),
        "derived genesis identity"
    );

    Ok(Genesis {
        identity,
        tree_state,
        auth,
    })
}
