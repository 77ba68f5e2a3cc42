//! State transitions: signing `H(oldState, newState)` and assembling the
//! inputs of the state-transition proof.

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkid_common::{fr_to_decimal, poseidon_hash};
use zkid_merkle::CIRCUIT_MT_LEVELS;

use crate::claim::Claim;
use crate::error::{IdentityError, Result};
use crate::id::Identifier;
use crate::identity::AuthMaterial;
use crate::keys::{PrivateKey, PublicKey, Signature};
use crate::trees::TreeState;

/// Message signed for a transition.
pub fn transition_challenge(old_state: &Fr, new_state: &Fr) -> Fr {
    poseidon_hash(&[*old_state, *new_state])
}

/// A signed transition from `old_tree_state` to `new_tree_state`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTransition {
    pub id: Identifier,
    pub old_tree_state: TreeState,
    pub new_tree_state: TreeState,
    pub is_old_state_genesis: bool,
    /// Auth claim proofs, evaluated at the old state.
    pub auth: AuthMaterial,
    pub signature: Signature,
}

/// Sign and assemble a transition. The trees must already hold `new_tree_state`;
/// nothing is mutated here.
pub fn build_transition(
    id: Identifier,
    old_tree_state: &TreeState,
    new_tree_state: &TreeState,
    auth: &AuthMaterial,
    key: &PrivateKey,
    is_old_state_genesis: bool,
) -> Result<StateTransition> {
    if auth.tree_state != *old_tree_state {
        return Err(IdentityError::InconsistentTreeState(
            "auth claim proofs must be evaluated at the old state".into(),
        ));
    }
    let challenge = transition_challenge(&old_tree_state.state(), &new_tree_state.state());
    let signature = key.sign(&challenge)?;

    tracing::info!(
        id = %id,
        old_state = %fr_to_decimal(&old_tree_state.state()),
        new_state = %fr_to_decimal(&new_tree_state.state()),
        is_old_state_genesis,
        "signed state transition"
    );

    Ok(StateTransition {
        id,
        old_tree_state: *old_tree_state,
        new_tree_state: *new_tree_state,
        is_old_state_genesis,
        auth: auth.clone(),
        signature,
    })
}

impl StateTransition {
    pub fn challenge(&self) -> Fr {
        transition_challenge(&self.old_tree_state.state(), &self.new_tree_state.state())
    }

    /// Signature check plus the auth claim of `public_key` proven at the old state.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        public_key.verify(&self.challenge(), &self.signature)
            && self.auth.tree_state == self.old_tree_state
            && self.auth.is_bound_to(public_key)
            && self.auth.verify()
    }

    pub fn inputs(&self) -> StateTransitionInputs {
        let aux = self.auth.non_revocation.aux_inputs();
        StateTransitionInputs {
            auth_claim: self.auth.claim,
            auth_claim_mtp: self.auth.inclusion.siblings_decimal(CIRCUIT_MT_LEVELS),
            auth_claim_non_rev_mtp: self.auth.non_revocation.siblings_decimal(CIRCUIT_MT_LEVELS),
            auth_claim_non_rev_mtp_aux_hi: fr_to_decimal(&aux.key),
            auth_claim_non_rev_mtp_aux_hv: fr_to_decimal(&aux.value),
            auth_claim_non_rev_mtp_no_aux: aux.no_aux_flag().to_string(),
            user_id: fr_to_decimal(&self.id.to_fr()),
            new_user_state: fr_to_decimal(&self.new_tree_state.state()),
            old_user_state: fr_to_decimal(&self.old_tree_state.state()),
            is_old_state_genesis: if self.is_old_state_genesis { "1" } else { "0" }.to_string(),
            claims_tree_root: fr_to_decimal(&self.old_tree_state.claims_root()),
            rev_tree_root: fr_to_decimal(&self.old_tree_state.revocation_root()),
            roots_tree_root: fr_to_decimal(&self.old_tree_state.root_of_roots()),
            signature_r8x: self.signature.r8x_decimal(),
            signature_r8y: self.signature.r8y_decimal(),
            signature_s: self.signature.s_decimal(),
        }
    }
}

/// Inputs of the state-transition proof. Field names and string encodings are
/// fixed by the proof system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionInputs {
    #[serde(rename = "authClaim")]
    pub auth_claim: Claim,
    #[serde(rename = "authClaimMtp")]
    pub auth_claim_mtp: Vec<String>,
    #[serde(rename = "authClaimNonRevMtp")]
    pub auth_claim_non_rev_mtp: Vec<String>,
    #[serde(rename = "authClaimNonRevMtpAuxHi")]
    pub auth_claim_non_rev_mtp_aux_hi: String,
    #[serde(rename = "authClaimNonRevMtpAuxHv")]
    pub auth_claim_non_rev_mtp_aux_hv: String,
    #[serde(rename = "authClaimNonRevMtpNoAux")]
    pub auth_claim_non_rev_mtp_no_aux: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "newUserState")]
    pub new_user_state: String,
    #[serde(rename = "oldUserState")]
    pub old_user_state: String,
    #[serde(rename = "isOldStateGenesis")]
    pub is_old_state_genesis: String,
    #[serde(rename = "claimsTreeRoot")]
    pub claims_tree_root: String,
    #[serde(rename = "revTreeRoot")]
    pub rev_tree_root: String,
    #[serde(rename = "rootsTreeRoot")]
    pub roots_tree_root: String,
    #[serde(rename = "signatureR8x")]
    pub signature_r8x: String,
    #[serde(rename = "signatureR8y")]
    pub signature_r8y: String,
    #[serde(rename = "signatureS")]
    pub signature_s: String,
}
