//! A persistent issuer: key, identity and trees behind one handle.
//!
//! Every mutation runs inside one [`Transaction`], so an issuance or
//! revocation lands in the store as a whole or not at all.

use rand::{CryptoRng, RngCore};
use zkid_common::fr_to_decimal;
use zkid_merkle::{Storage, Transaction, TreeId};

use crate::claim::Claim;
use crate::disclosure::{build_disclosure_inputs, DisclosureInputs};
use crate::error::{IdentityError, Result};
use crate::id::Identifier;
use crate::identity::{auth_claim, genesis, AuthMaterial, Identity, AUTH_CLAIM_NONCE};
use crate::keys::{PrivateKey, PublicKey};
use crate::keystore::KeyStore;
use crate::transition::{build_transition, StateTransition};
use crate::trees::{IdentityTrees, TreeState};

pub const PRIVATE_KEY_ID: &str = "issuer.key";
pub const IDENTITY_RECORD_ID: &str = "identity.json";

/// Result of issuing one claim.
#[derive(Clone, Debug)]
pub struct Issuance {
    pub claim: Claim,
    pub transition: StateTransition,
    /// Disclosure inputs at the post-issuance state.
    pub disclosure: DisclosureInputs,
}

pub struct Issuer<S: Storage> {
    storage: S,
    trees: IdentityTrees,
    key: PrivateKey,
    public_key: PublicKey,
    identity: Identity,
    auth_claim: Claim,
}

impl<S: Storage> Issuer<S> {
    /// Create a new identity on empty trees and persist its key and record.
    ///
    /// Returns the first transition, away from the genesis state.
    pub fn init<R: RngCore + CryptoRng>(
        storage: S,
        keystore: &dyn KeyStore,
        rng: &mut R,
    ) -> Result<(Self, StateTransition)> {
        if keystore.load(IDENTITY_RECORD_ID)?.is_some() {
            return Err(IdentityError::InconsistentTreeState(
                "an identity record already exists".into(),
            ));
        }

        let key = PrivateKey::random(rng);
        let public_key = key.public()?;
        let trees = IdentityTrees::new();

        let (genesis, transition) = {
            let mut tx = Transaction::new(&storage);
            let genesis = genesis(&trees, &mut tx, &public_key, AUTH_CLAIM_NONCE)?;
            trees.snapshot_current_root(&mut tx)?;
            let new_state = trees.current_state(&tx)?;
            let transition = build_transition(
                genesis.identity.id(),
                &genesis.tree_state,
                &new_state,
                &genesis.auth,
                &key,
                true,
            )?;

            tx.commit()?;
            (genesis, transition)
        };

        // Written only after the trees are committed.
        key.store(keystore, PRIVATE_KEY_ID)?;
        keystore.store(IDENTITY_RECORD_ID, &serde_json::to_vec_pretty(&genesis.identity)?)?;

        tracing::info!(id = %genesis.identity.id(), "initialised issuer identity");

        let issuer = Self {
            storage,
            trees,
            key,
            public_key,
            identity: genesis.identity,
            auth_claim: genesis.auth.claim,
        };
        Ok((issuer, transition))
    }

    /// Restore an issuer from its key store and trees.
    pub fn load(storage: S, keystore: &dyn KeyStore) -> Result<Self> {
        let key = PrivateKey::load(keystore, PRIVATE_KEY_ID)?.ok_or_else(|| {
            IdentityError::Encoding(format!("no private key stored under '{}'", PRIVATE_KEY_ID))
        })?;
        let record = keystore.load(IDENTITY_RECORD_ID)?.ok_or_else(|| {
            IdentityError::Encoding(format!(
                "no identity record stored under '{}'",
                IDENTITY_RECORD_ID
            ))
        })?;
        let identity: Identity = serde_json::from_slice(&record)?;
        identity.check()?;

        let public_key = key.public()?;
        let auth_claim = auth_claim(&public_key, identity.auth_nonce())?;
        let trees = IdentityTrees::new();
        trees.prove_inclusion(&storage, TreeId::Claims, &auth_claim.index_hash())?;
        trees.prove_claim(&storage, &auth_claim, identity.genesis_state())?;

        tracing::info!(id = %identity.id(), "loaded issuer identity");
        Ok(Self {
            storage,
            trees,
            key,
            public_key,
            identity,
            auth_claim,
        })
    }

    pub fn id(&self) -> Identifier {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn auth_claim(&self) -> &Claim {
        &self.auth_claim
    }

    pub fn trees(&self) -> &IdentityTrees {
        &self.trees
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn current_state(&self) -> Result<TreeState> {
        self.trees.current_state(&self.storage)
    }

    /// Auth claim proofs at `at`.
    pub fn auth_material(&self, at: &TreeState) -> Result<AuthMaterial> {
        AuthMaterial::at(&self.trees, &self.storage, &self.auth_claim, at)
    }

    /// Add `claim` to the claims tree and sign the resulting transition.
    ///
    /// Fails with `InconsistentTreeState` if the trees are not at `expected_prior`.
    pub fn issue_claim(&mut self, claim: &Claim, expected_prior: &TreeState) -> Result<Issuance> {
        if claim.revocation_nonce() == self.identity.auth_nonce() {
            return Err(IdentityError::Encoding(format!(
                "revocation nonce {} is reserved for the auth claim",
                claim.revocation_nonce()
            )));
        }
        let mut tx = Transaction::new(&self.storage);
        let old_state = self.trees.current_state(&tx)?;
        if old_state != *expected_prior {
            return Err(IdentityError::InconsistentTreeState(format!(
                "expected prior state {}, trees are at {}",
                fr_to_decimal(&expected_prior.state()),
                fr_to_decimal(&old_state.state())
            )));
        }

        let auth = AuthMaterial::at(&self.trees, &tx, &self.auth_claim, &old_state)?;
        self.trees.snapshot_current_root(&mut tx)?;
        self.trees.insert_claim(&mut tx, claim)?;
        let new_state = self.trees.current_state(&tx)?;

        let transition = build_transition(
            self.id(),
            &old_state,
            &new_state,
            &auth,
            &self.key,
            self.identity.is_genesis(&old_state),
        )?;
        let issuer_auth = AuthMaterial::at(&self.trees, &tx, &self.auth_claim, &new_state)?;
        let disclosure = build_disclosure_inputs(
            &self.trees,
            &tx,
            claim,
            claim.revocation_nonce(),
            &self.key,
            self.id(),
            &issuer_auth,
        )?;
        tx.commit()?;

        tracing::info!(
            id = %self.id(),
            nonce = claim.revocation_nonce(),
            new_state = %fr_to_decimal(&new_state.state()),
            "issued claim"
        );
        Ok(Issuance {
            claim: *claim,
            transition,
            disclosure,
        })
    }

    /// Revoke the claim carrying `nonce` and sign the resulting transition.
    pub fn revoke(&mut self, nonce: u64) -> Result<StateTransition> {
        if nonce == self.identity.auth_nonce() {
            return Err(IdentityError::Encoding(
                "the auth claim nonce cannot be revoked".into(),
            ));
        }
        let mut tx = Transaction::new(&self.storage);
        let old_state = self.trees.current_state(&tx)?;
        let auth = AuthMaterial::at(&self.trees, &tx, &self.auth_claim, &old_state)?;
        self.trees.mark_revoked(&mut tx, nonce)?;
        let new_state = self.trees.current_state(&tx)?;

        let transition = build_transition(
            self.id(),
            &old_state,
            &new_state,
            &auth,
            &self.key,
            self.identity.is_genesis(&old_state),
        )?;
        tx.commit()?;

        tracing::info!(id = %self.id(), nonce, "revoked claim");
        Ok(transition)
    }

    /// Disclosure inputs for an issued claim, evaluated at the current state.
    pub fn disclosure_inputs(&self, claim: &Claim) -> Result<DisclosureInputs> {
        let current = self.current_state()?;
        let issuer_auth = self.auth_material(&current)?;
        build_disclosure_inputs(
            &self.trees,
            &self.storage,
            claim,
            claim.revocation_nonce(),
            &self.key,
            self.id(),
            &issuer_auth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimOptions;
    use crate::keystore::MemoryKeyStore;
    use crate::schema::SchemaHash;
    use halo2curves_axiom::bn256::Fr;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Arc;
    use zkid_merkle::{MemoryStorage, StorageError, WriteBatch};

    fn claim(nonce: u64) -> Claim {
        let options = ClaimOptions::new(nonce).with_value_data([Fr::from(nonce * 10)]);
        Claim::new(SchemaHash::for_type(b"{}", "TestCredential"), &options).unwrap()
    }

    #[test]
    fn init_then_load_restores_the_same_identity() {
        let storage = Arc::new(MemoryStorage::new());
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (issuer, transition) = Issuer::init(storage.clone(), &keystore, &mut rng).unwrap();
        assert!(transition.is_old_state_genesis);
        assert!(transition.verify(issuer.public_key()));

        let loaded = Issuer::load(storage, &keystore).unwrap();
        assert_eq!(loaded.id(), issuer.id());
        assert_eq!(loaded.public_key(), issuer.public_key());
        assert_eq!(loaded.current_state().unwrap(), issuer.current_state().unwrap());
    }

    /// Serves reads from memory and refuses every write.
    struct ReadOnlyStorage(MemoryStorage);

    impl Storage for ReadOnlyStorage {
        fn get_node(
            &self,
            tree: TreeId,
            hash: &Fr,
        ) -> std::result::Result<Option<zkid_merkle::Node>, StorageError> {
            self.0.get_node(tree, hash)
        }

        fn get_root(&self, tree: TreeId) -> std::result::Result<Option<Fr>, StorageError> {
            self.0.get_root(tree)
        }

        fn apply(&self, _batch: WriteBatch) -> std::result::Result<(), StorageError> {
            Err(StorageError::Backend("read-only".into()))
        }
    }

    #[test]
    fn failed_commit_leaves_no_identity_record() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let storage = ReadOnlyStorage(MemoryStorage::new());
        assert!(matches!(
            Issuer::init(storage, &keystore, &mut rng),
            Err(IdentityError::Storage(_))
        ));
        assert!(keystore.load(IDENTITY_RECORD_ID).unwrap().is_none());
        assert!(keystore.load(PRIVATE_KEY_ID).unwrap().is_none());

        // A retry on working storage is not blocked by a stale record.
        Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
    }

    #[test]
    fn auth_nonce_is_reserved_for_issuance() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
        let before = issuer.current_state().unwrap();

        assert!(matches!(
            issuer.issue_claim(&claim(AUTH_CLAIM_NONCE), &before),
            Err(IdentityError::Encoding(_))
        ));
        assert_eq!(issuer.current_state().unwrap(), before);
    }

    #[test]
    fn init_refuses_existing_identity() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
        assert!(matches!(
            Issuer::init(MemoryStorage::new(), &keystore, &mut rng),
            Err(IdentityError::InconsistentTreeState(_))
        ));
    }

    #[test]
    fn load_without_trees_fails() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
        assert!(matches!(
            Issuer::load(MemoryStorage::new(), &keystore),
            Err(IdentityError::NotFound { tree: TreeId::Claims, .. })
        ));
    }

    #[test]
    fn stale_prior_state_aborts_issuance_without_writes() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
        let stale = *issuer.identity().genesis_state();
        let before = issuer.current_state().unwrap();

        assert!(matches!(
            issuer.issue_claim(&claim(2), &stale),
            Err(IdentityError::InconsistentTreeState(_))
        ));
        assert_eq!(issuer.current_state().unwrap(), before);
    }

    #[test]
    fn duplicate_issuance_leaves_no_partial_state() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();

        let state = issuer.current_state().unwrap();
        issuer.issue_claim(&claim(2), &state).unwrap();
        let after_first = issuer.current_state().unwrap();

        // The second attempt snapshots the root, then fails on the duplicate key.
        assert!(matches!(
            issuer.issue_claim(&claim(2), &after_first),
            Err(IdentityError::DuplicateKey { tree: TreeId::Claims, .. })
        ));
        assert_eq!(issuer.current_state().unwrap(), after_first);
    }

    #[test]
    fn issuance_and_revocation_transitions_chain() {
        let keystore = MemoryKeyStore::new();
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (mut issuer, first) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();

        let state = issuer.current_state().unwrap();
        assert_eq!(first.new_tree_state, state);
        let issuance = issuer.issue_claim(&claim(2), &state).unwrap();
        assert!(!issuance.transition.is_old_state_genesis);
        assert_eq!(issuance.transition.old_tree_state, state);
        assert!(issuance.transition.verify(issuer.public_key()));
        assert!(issuance.disclosure.verify(issuer.public_key()));

        let revocation = issuer.revoke(2).unwrap();
        assert_eq!(revocation.old_tree_state, issuance.transition.new_tree_state);
        assert!(revocation.verify(issuer.public_key()));

        let lazy = issuer.disclosure_inputs(&claim(2)).unwrap();
        assert!(lazy.is_revoked());
        assert!(!lazy.verify(issuer.public_key()));

        assert!(matches!(
            issuer.revoke(AUTH_CLAIM_NONCE),
            Err(IdentityError::Encoding(_))
        ));
    }
}
