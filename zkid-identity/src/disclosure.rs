//! Inputs a credential holder needs to prove a claim is valid.
//!
//! The bundle carries the claim's inclusion proof and its non-revocation proof
//! at one issuer tree state, the issuer's signature over `H(indexHash,
//! valueHash)`, and the issuer's own auth material so the signature can be
//! tied back to a provable issuer state.

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkid_common::fr_to_decimal;
use zkid_merkle::{verify_proof, MerkleProof, NodeReader, CIRCUIT_MT_LEVELS};

use crate::claim::Claim;
use crate::error::{IdentityError, Result};
use crate::id::Identifier;
use crate::identity::AuthMaterial;
use crate::keys::{PrivateKey, PublicKey, Signature};
use crate::trees::{IdentityTrees, TreeState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisclosureInputs {
    pub claim: Claim,
    /// Issuer tree state the proofs below are evaluated at.
    pub tree_state: TreeState,
    pub inclusion: MerkleProof,
    pub non_revocation: MerkleProof,
    pub signature: Signature,
    pub issuer_id: Identifier,
    pub issuer_auth: AuthMaterial,
}

/// Assemble disclosure inputs for `claim` at the trees' current state.
///
/// `nonce` must be the claim's revocation nonce. `issuer_auth` carries the
/// issuer's auth claim and proofs at the issuer state the signature binds to.
pub fn build_disclosure_inputs<R: NodeReader + ?Sized>(
    trees: &IdentityTrees,
    store: &R,
    claim: &Claim,
    nonce: u64,
    key: &PrivateKey,
    issuer_id: Identifier,
    issuer_auth: &AuthMaterial,
) -> Result<DisclosureInputs> {
    if claim.revocation_nonce() != nonce {
        return Err(IdentityError::Encoding(format!(
            "nonce {} does not match the claim's revocation nonce {}",
            nonce,
            claim.revocation_nonce()
        )));
    }

    let tree_state = trees.current_state(store)?;
    let inclusion = trees.prove_claim(store, claim, &tree_state)?;
    let non_revocation = trees.prove_non_revocation(store, nonce, &tree_state)?;
    if non_revocation.existence {
        tracing::warn!(
            nonce,
            issuer = %issuer_id,
            "claim is revoked at the disclosed state"
        );
    }
    let signature = key.sign(&claim.signing_message())?;

    tracing::info!(
        issuer = %issuer_id,
        index_hash = %fr_to_decimal(&claim.index_hash()),
        state = %fr_to_decimal(&tree_state.state()),
        "built disclosure inputs"
    );

    Ok(DisclosureInputs {
        claim: *claim,
        tree_state,
        inclusion,
        non_revocation,
        signature,
        issuer_id,
        issuer_auth: issuer_auth.clone(),
    })
}

impl DisclosureInputs {
    pub fn is_revoked(&self) -> bool {
        self.non_revocation.existence
    }

    /// Every proof and the claim signature check out against `issuer_key`, and
    /// the auth material is that key's auth claim.
    pub fn verify(&self, issuer_key: &PublicKey) -> bool {
        let (hi, hv) = self.claim.hi_hv();
        let nonce = Fr::from(self.claim.revocation_nonce());
        issuer_key.verify(&self.claim.signing_message(), &self.signature)
            && self.inclusion.existence
            && verify_proof(&self.tree_state.claims_root(), &self.inclusion, &hi, &hv)
            && !self.is_revoked()
            && verify_proof(
                &self.tree_state.revocation_root(),
                &self.non_revocation,
                &nonce,
                &Fr::zero(),
            )
            && self.issuer_auth.is_bound_to(issuer_key)
            && self.issuer_auth.verify()
    }

    pub fn claim_inputs(&self) -> ClaimInputs {
        let aux = self.non_revocation.aux_inputs();
        ClaimInputs {
            issuer_claim: self.claim,
            issuer_claim_non_rev_claims_tree_root: fr_to_decimal(&self.tree_state.claims_root()),
            issuer_claim_non_rev_rev_tree_root: fr_to_decimal(&self.tree_state.revocation_root()),
            issuer_claim_non_rev_roots_tree_root: fr_to_decimal(
                &self.tree_state.root_of_roots(),
            ),
            issuer_claim_non_rev_state: fr_to_decimal(&self.tree_state.state()),
            issuer_claim_non_rev_mtp: self.non_revocation.siblings_decimal(CIRCUIT_MT_LEVELS),
            issuer_claim_non_rev_mtp_aux_hi: fr_to_decimal(&aux.key),
            issuer_claim_non_rev_mtp_aux_hv: fr_to_decimal(&aux.value),
            issuer_claim_non_rev_mtp_no_aux: aux.no_aux_flag().to_string(),
            claim_schema: fr_to_decimal(&self.claim.schema_hash().to_fr()),
            issuer_claim_signature_r8x: self.signature.r8x_decimal(),
            issuer_claim_signature_r8y: self.signature.r8y_decimal(),
            issuer_claim_signature_s: self.signature.s_decimal(),
        }
    }
}

/// Claim half of the holder's query-proof inputs. Field names and string
/// encodings are fixed by the proof system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInputs {
    #[serde(rename = "issuerClaim")]
    pub issuer_claim: Claim,
    #[serde(rename = "issuerClaimNonRevClaimsTreeRoot")]
    pub issuer_claim_non_rev_claims_tree_root: String,
    #[serde(rename = "issuerClaimNonRevRevTreeRoot")]
    pub issuer_claim_non_rev_rev_tree_root: String,
    #[serde(rename = "issuerClaimNonRevRootsTreeRoot")]
    pub issuer_claim_non_rev_roots_tree_root: String,
    #[serde(rename = "issuerClaimNonRevState")]
    pub issuer_claim_non_rev_state: String,
    #[serde(rename = "issuerClaimNonRevMtp")]
    pub issuer_claim_non_rev_mtp: Vec<String>,
    #[serde(rename = "issuerClaimNonRevMtpAuxHi")]
    pub issuer_claim_non_rev_mtp_aux_hi: String,
    #[serde(rename = "issuerClaimNonRevMtpAuxHv")]
    pub issuer_claim_non_rev_mtp_aux_hv: String,
    #[serde(rename = "issuerClaimNonRevMtpNoAux")]
    pub issuer_claim_non_rev_mtp_no_aux: String,
    #[serde(rename = "claimSchema")]
    pub claim_schema: String,
    #[serde(rename = "issuerClaimSignatureR8x")]
    pub issuer_claim_signature_r8x: String,
    #[serde(rename = "issuerClaimSignatureR8y")]
    pub issuer_claim_signature_r8y: String,
    #[serde(rename = "issuerClaimSignatureS")]
    pub issuer_claim_signature_s: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimOptions, Subject};
    use crate::id::IdType;
    use crate::identity::{genesis, Genesis, AUTH_CLAIM_NONCE};
    use crate::schema::SchemaHash;
    use zkid_merkle::{MemoryStorage, Transaction};

    struct Fixture {
        storage: MemoryStorage,
        trees: IdentityTrees,
        key: PrivateKey,
        genesis: Genesis,
        claim: Claim,
    }

    fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let trees = IdentityTrees::new();
        let key = PrivateKey::from_bytes([9u8; 32]);
        let pk = key.public().unwrap();

        let mut tx = Transaction::new(&storage);
        let genesis = genesis(&trees, &mut tx, &pk, AUTH_CLAIM_NONCE).unwrap();
        trees.snapshot_current_root(&mut tx).unwrap();
        let holder = Identifier::from_genesis_state(IdType::DEFAULT, &-Fr::from(777u64));
        let options = ClaimOptions::new(2)
            .with_subject(Subject::OtherIndex(holder))
            .with_index_data([Fr::from(25u64)]);
        let claim = Claim::new(SchemaHash::for_type(b"{}", "KYCAgeCredential"), &options).unwrap();
        trees.insert_claim(&mut tx, &claim).unwrap();
        tx.commit().unwrap();

        Fixture {
            storage,
            trees,
            key,
            genesis,
            claim,
        }
    }

    fn disclose(f: &Fixture, nonce: u64) -> Result<DisclosureInputs> {
        build_disclosure_inputs(
            &f.trees,
            &f.storage,
            &f.claim,
            nonce,
            &f.key,
            f.genesis.identity.id(),
            &f.genesis.auth,
        )
    }

    #[test]
    fn disclosure_verifies_against_issuer_key() {
        let f = fixture();
        let inputs = disclose(&f, 2).unwrap();
        assert!(!inputs.is_revoked());
        assert!(inputs.verify(&f.key.public().unwrap()));
        assert!(!inputs.verify(&PrivateKey::from_bytes([1u8; 32]).public().unwrap()));
    }

    #[test]
    fn auth_material_of_another_issuer_is_rejected() {
        let f = fixture();
        let mut inputs = disclose(&f, 2).unwrap();

        let other_storage = MemoryStorage::new();
        let other_pk = PrivateKey::from_bytes([3u8; 32]).public().unwrap();
        let mut tx = Transaction::new(&other_storage);
        let other = genesis(&f.trees, &mut tx, &other_pk, AUTH_CLAIM_NONCE).unwrap();
        assert!(other.auth.verify());

        inputs.issuer_auth = other.auth;
        assert!(!inputs.verify(&f.key.public().unwrap()));
    }

    #[test]
    fn claim_inputs_encode_no_aux_for_untouched_revocation_tree() {
        let f = fixture();
        let inputs = disclose(&f, 2).unwrap().claim_inputs();
        assert_eq!(inputs.issuer_claim_non_rev_mtp_no_aux, "1");
        assert_eq!(inputs.issuer_claim_non_rev_mtp_aux_hi, "0");
        assert_eq!(inputs.issuer_claim_non_rev_mtp_aux_hv, "0");
        assert_eq!(inputs.issuer_claim_non_rev_rev_tree_root, "0");
        assert_eq!(inputs.issuer_claim_non_rev_mtp.len(), CIRCUIT_MT_LEVELS);
        assert_eq!(
            inputs.claim_schema,
            fr_to_decimal(&f.claim.schema_hash().to_fr())
        );

        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 13);
        assert_eq!(json["issuerClaimNonRevMtpNoAux"], "1");
        assert!(json["issuerClaimSignatureS"].is_string());
    }

    #[test]
    fn nonce_must_match_claim() {
        let f = fixture();
        assert!(matches!(disclose(&f, 3), Err(IdentityError::Encoding(_))));
    }

    #[test]
    fn revoked_claim_yields_existence_proof() {
        let f = fixture();
        let mut tx = Transaction::new(&f.storage);
        f.trees.mark_revoked(&mut tx, 2).unwrap();
        tx.commit().unwrap();

        let inputs = disclose(&f, 2).unwrap();
        assert!(inputs.is_revoked());
        assert!(!inputs.verify(&f.key.public().unwrap()));
    }

    #[test]
    fn aux_node_is_reported_when_paths_collide() {
        let f = fixture();
        // A lone revoked nonce sits at the root, so the walk for 2 ends on its leaf.
        let mut tx = Transaction::new(&f.storage);
        f.trees.mark_revoked(&mut tx, 6).unwrap();
        tx.commit().unwrap();

        let inputs = disclose(&f, 2).unwrap();
        let claim_inputs = inputs.claim_inputs();
        assert_eq!(claim_inputs.issuer_claim_non_rev_mtp_no_aux, "0");
        assert_eq!(claim_inputs.issuer_claim_non_rev_mtp_aux_hi, "6");
        assert_eq!(claim_inputs.issuer_claim_non_rev_mtp_aux_hv, "0");
        assert!(inputs.verify(&f.key.public().unwrap()));
    }
}
