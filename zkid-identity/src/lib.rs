//! Issuer identity state.
//!
//! An identity is three sparse Merkle trees (claims, revocations, roots of the
//! claims tree) folded into one state hash. This crate encodes claims into
//! their eight-slot form, derives the genesis identity from the auth claim,
//! signs state transitions and assembles the public inputs a prover needs for
//! the state-transition and claim-disclosure proofs.

pub mod claim;
pub mod disclosure;
pub mod error;
pub mod id;
pub mod identity;
pub mod issuer;
pub mod keys;
pub mod keystore;
pub mod schema;
pub mod transition;
pub mod trees;

pub use claim::{data_slot_from_bytes, Claim, ClaimOptions, Subject};
pub use disclosure::{build_disclosure_inputs, ClaimInputs, DisclosureInputs};
pub use error::{IdentityError, Result};
pub use id::{IdType, Identifier};
pub use identity::{auth_claim, genesis, AuthMaterial, Genesis, Identity, AUTH_CLAIM_NONCE};
pub use issuer::{Issuance, Issuer, IDENTITY_RECORD_ID, PRIVATE_KEY_ID};
pub use keys::{PrivateKey, PublicKey, Signature};
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore};
pub use schema::SchemaHash;
pub use transition::{
    build_transition, transition_challenge, StateTransition, StateTransitionInputs,
};
pub use trees::{identity_state, IdentityTrees, TreeState};
