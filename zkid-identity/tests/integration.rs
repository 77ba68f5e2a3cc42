//! End-to-end issuer flows over the in-memory and sled backends.

use std::sync::Arc;

use halo2curves_axiom::bn256::Fr;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use zkid_common::fr_to_decimal;
use zkid_identity::{
    auth_claim, genesis, Claim, ClaimOptions, FileKeyStore, IdType, IdentityError,
    IdentityTrees, Identifier, Issuer, MemoryKeyStore, PrivateKey, SchemaHash, Subject,
    AUTH_CLAIM_NONCE,
};
use zkid_merkle::{
    verify_proof, MemoryStorage, SledStorage, Transaction, TreeId, CIRCUIT_MT_LEVELS,
};

const KYC_SCHEMA: &[u8] =
    br#"{"@context":[{"KYCAgeCredential":{"@id":"kyc-v2:KYCAgeCredential"}}]}"#;

fn kyc_claim(holder: Identifier, age: u64, nonce: u64) -> Claim {
    let options = ClaimOptions::new(nonce)
        .with_subject(Subject::OtherIndex(holder))
        .with_index_data([Fr::from(age)]);
    Claim::new(SchemaHash::for_type(KYC_SCHEMA, "KYCAgeCredential"), &options)
        .expect("kyc claim should encode")
}

fn holder(seed: u64) -> Identifier {
    Identifier::from_genesis_state(IdType::DEFAULT, &-Fr::from(seed))
}

fn temp_dir(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("zkid-{}-{}", label, rand::random::<u64>()))
}

#[test]
fn issue_kyc_age_claim_end_to_end() {
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let keystore = MemoryKeyStore::new();
    let (mut issuer, first) =
        Issuer::init(MemoryStorage::new(), &keystore, &mut rng).expect("init should succeed");
    assert!(first.verify(issuer.public_key()));
    assert_eq!(first.inputs().is_old_state_genesis, "1");

    let holder_id = holder(1);
    let claim = kyc_claim(holder_id, 25, 2);
    assert_eq!(claim.subject().unwrap(), Subject::OtherIndex(holder_id));

    let prior = issuer.current_state().unwrap();
    let issuance = issuer.issue_claim(&claim, &prior).expect("issuance should succeed");

    let transition = issuance.transition.inputs();
    assert_eq!(transition.is_old_state_genesis, "0");
    assert_eq!(transition.old_user_state, fr_to_decimal(&prior.state()));
    assert_eq!(transition.auth_claim_mtp.len(), CIRCUIT_MT_LEVELS);
    assert!(issuance.transition.verify(issuer.public_key()));

    let disclosure = &issuance.disclosure;
    assert!(disclosure.verify(issuer.public_key()));
    let (hi, hv) = claim.hi_hv();
    assert!(verify_proof(
        &disclosure.tree_state.claims_root(),
        &disclosure.inclusion,
        &hi,
        &hv
    ));

    let inputs = disclosure.claim_inputs();
    assert_eq!(inputs.issuer_claim_non_rev_mtp_no_aux, "1");
    assert_eq!(inputs.issuer_claim_non_rev_rev_tree_root, "0");
    assert_eq!(
        inputs.issuer_claim_non_rev_state,
        fr_to_decimal(&issuance.transition.new_tree_state.state())
    );
    assert_eq!(inputs.issuer_claim.index_data()[0], Fr::from(25u64));
}

#[test]
fn genesis_depends_only_on_key_and_nonce() {
    let pk = PrivateKey::from_bytes([5u8; 32]).public().unwrap();
    let ids: Vec<_> = (0..2)
        .map(|_| {
            let storage = MemoryStorage::new();
            let trees = IdentityTrees::new();
            let mut tx = Transaction::new(&storage);
            let genesis = genesis(&trees, &mut tx, &pk, AUTH_CLAIM_NONCE).unwrap();
            tx.commit().unwrap();
            genesis.identity
        })
        .collect();
    assert_eq!(ids[0], ids[1]);
    assert!(ids[0].id().matches_genesis_state(&ids[0].genesis_state().state()));
}

#[test]
fn genesis_from_a_fixed_key_is_stable() {
    let pk = PrivateKey::from_bytes([1u8; 32]).public().unwrap();
    let claim = auth_claim(&pk, AUTH_CLAIM_NONCE).unwrap();
    assert_eq!(
        claim.to_decimal_strings(),
        [
            "304427537360709784173770334266246861770",
            "0",
            "19389011904245798887118520157478072989852277016339137339138523847979921452519",
            "5483060444207613870303630062165525103674914350842280928254582222145760006827",
            "1",
            "0",
            "0",
            "0",
        ]
    );
    let (hi, hv) = claim.hi_hv();
    assert_eq!(
        fr_to_decimal(&hi),
        "16779126954594245131610913853673037732067429492786409932103324812761932765696"
    );
    assert_eq!(
        fr_to_decimal(&hv),
        "21518783488142881249574161926391633454271617519087334193882115793129426722730"
    );

    let storage = MemoryStorage::new();
    let mut tx = Transaction::new(&storage);
    let genesis = genesis(&IdentityTrees::new(), &mut tx, &pk, AUTH_CLAIM_NONCE).unwrap();
    assert_eq!(
        fr_to_decimal(&genesis.tree_state.claims_root()),
        "13600116674531319603516874023236881906552165271431986485324121271223363235128"
    );
    assert_eq!(
        fr_to_decimal(&genesis.tree_state.state()),
        "12934702102083142494240337049425717150516182116472977276878921716972335825076"
    );
    assert_eq!(
        genesis.identity.id().to_string(),
        "112FDrahYutG7xU8qW3TqgQREDAGRFhg8tpYnu1REV"
    );
}

#[test]
fn every_prior_claims_root_is_in_the_roots_tree() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let keystore = MemoryKeyStore::new();
    let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();

    let mut seen = vec![issuer.identity().genesis_state().claims_root()];
    for nonce in 2..6 {
        let prior = issuer.current_state().unwrap();
        seen.push(prior.claims_root());
        issuer
            .issue_claim(&kyc_claim(holder(nonce), 18 + nonce, nonce), &prior)
            .unwrap();
    }

    let trees = issuer.trees();
    for root in seen {
        let proof = trees
            .prove_inclusion(issuer.storage(), TreeId::Roots, &root)
            .expect("every prior claims root should be recorded");
        assert!(proof.existence);
    }
}

#[test]
fn revocation_flips_the_non_revocation_proof() {
    let mut rng = ChaCha20Rng::seed_from_u64(8);
    let keystore = MemoryKeyStore::new();
    let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();
    let claim = kyc_claim(holder(9), 30, 4);
    let prior = issuer.current_state().unwrap();
    let issuance = issuer.issue_claim(&claim, &prior).unwrap();
    assert!(!issuance.disclosure.is_revoked());

    let transition = issuer.revoke(4).unwrap();
    assert!(transition.verify(issuer.public_key()));
    assert_ne!(transition.new_tree_state.revocation_root(), Fr::zero());

    let after = issuer.disclosure_inputs(&claim).unwrap();
    assert!(after.is_revoked());
    assert!(verify_proof(
        &after.tree_state.revocation_root(),
        &after.non_revocation,
        &Fr::from(4u64),
        &Fr::zero()
    ));

    // The earlier bundle still describes the pre-revocation state.
    assert!(issuance.disclosure.verify(issuer.public_key()));

    assert!(matches!(
        issuer.revoke(4),
        Err(IdentityError::DuplicateKey { tree: TreeId::Revocations, .. })
    ));
}

#[test]
fn issuer_reloads_from_disk() {
    let db_path = temp_dir("db");
    let keys_dir = temp_dir("keys");
    let claim = kyc_claim(holder(3), 40, 2);

    let (id, state) = {
        let storage = SledStorage::open(&db_path).unwrap();
        let keystore = FileKeyStore::new(&keys_dir);
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let (mut issuer, _) = Issuer::init(storage, &keystore, &mut rng).unwrap();
        let prior = issuer.current_state().unwrap();
        issuer.issue_claim(&claim, &prior).unwrap();
        (issuer.id(), issuer.current_state().unwrap())
    };

    let storage = SledStorage::open(&db_path).unwrap();
    let keystore = FileKeyStore::new(&keys_dir);
    let issuer = Issuer::load(storage, &keystore).expect("reload should succeed");
    assert_eq!(issuer.id(), id);
    assert_eq!(issuer.current_state().unwrap(), state);
    assert_eq!(
        issuer.auth_claim(),
        &auth_claim(issuer.public_key(), AUTH_CLAIM_NONCE).unwrap()
    );
    assert!(issuer.disclosure_inputs(&claim).unwrap().verify(issuer.public_key()));

    drop(issuer);
    let _ = std::fs::remove_dir_all(&db_path);
    let _ = std::fs::remove_dir_all(&keys_dir);
}

#[test]
fn lazy_disclosure_tracks_the_current_state() {
    let mut rng = ChaCha20Rng::seed_from_u64(10);
    let keystore = MemoryKeyStore::new();
    let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();

    let first = kyc_claim(holder(11), 21, 2);
    let prior = issuer.current_state().unwrap();
    let cached = issuer.issue_claim(&first, &prior).unwrap().disclosure;

    let second = kyc_claim(holder(12), 22, 3);
    let prior = issuer.current_state().unwrap();
    issuer.issue_claim(&second, &prior).unwrap();

    let lazy = issuer.disclosure_inputs(&first).unwrap();
    assert_ne!(lazy.tree_state, cached.tree_state);
    assert_eq!(lazy.tree_state, issuer.current_state().unwrap());
    assert!(lazy.verify(issuer.public_key()));
    assert!(cached.verify(issuer.public_key()));
}

#[test]
fn concurrent_writer_is_detected_by_expected_state() {
    let storage = Arc::new(MemoryStorage::new());
    let keystore = MemoryKeyStore::new();
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let (mut writer_a, _) = Issuer::init(storage.clone(), &keystore, &mut rng).unwrap();
    let mut writer_b = Issuer::load(storage, &keystore).unwrap();

    let seen_by_b = writer_b.current_state().unwrap();
    let prior = writer_a.current_state().unwrap();
    writer_a.issue_claim(&kyc_claim(holder(20), 50, 2), &prior).unwrap();

    assert!(matches!(
        writer_b.issue_claim(&kyc_claim(holder(21), 51, 3), &seen_by_b),
        Err(IdentityError::InconsistentTreeState(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn issued_claims_stay_provable(nonces in prop::collection::btree_set(2u64..10_000, 1..6)) {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let keystore = MemoryKeyStore::new();
        let (mut issuer, _) = Issuer::init(MemoryStorage::new(), &keystore, &mut rng).unwrap();

        let claims: Vec<_> = nonces
            .iter()
            .map(|nonce| kyc_claim(holder(*nonce), nonce % 100, *nonce))
            .collect();
        for claim in &claims {
            let prior = issuer.current_state().unwrap();
            let issuance = issuer.issue_claim(claim, &prior).unwrap();
            prop_assert!(issuance.transition.verify(issuer.public_key()));
        }
        for claim in &claims {
            let disclosure = issuer.disclosure_inputs(claim).unwrap();
            prop_assert!(disclosure.verify(issuer.public_key()));
        }
    }
}
