//! Issuer signing keys.
//!
//! Keys live on Grumpkin, whose base field is the BN254 scalar field, so a
//! public key is a pair of field elements that fit directly into claim slots.
//! Signatures are deterministic Schnorr signatures over one field element:
//!
//! ```text
//! r = H_nonce(key, m)      R = r·G
//! c = Poseidon(R.x, R.y, A.x, A.y, m)
//! S = r + c·s
//! ```
//!
//! and verify as `S·G == R + c·A`.

use std::fmt;

use group::{prime::PrimeCurveAffine, Curve};
use halo2curves_axiom::{
    bn256::Fr,
    ff::Field,
    grumpkin::{Fr as Scalar, G1Affine, G1},
    CurveAffine,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zkid_common::{
    field_from_le_bytes, field_to_decimal, field_to_le_bytes, fr_to_bytes, poseidon_hash,
    reduce_be_bytes, serde_fr,
};

use crate::error::{IdentityError, Result};
use crate::keystore::KeyStore;

pub const PRIVATE_KEY_LEN: usize = 32;

const KEY_EXPANSION_CONTEXT: &str = "zkid issuer key expansion v1";
const NONCE_CONTEXT: &str = "zkid issuer signature nonce v1";

#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey([u8; PRIVATE_KEY_LEN]);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LEN]) -> Self {
        PrivateKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; PRIVATE_KEY_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::Encoding(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(PrivateKey(bytes))
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        PrivateKey(bytes)
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.0
    }

    pub fn load(store: &dyn KeyStore, id: &str) -> Result<Option<Self>> {
        match store.load(id)? {
            Some(bytes) => Ok(Some(Self::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn store(&self, store: &dyn KeyStore, id: &str) -> Result<()> {
        store.store(id, &self.0)
    }

    /// Signing scalar plus the per-key nonce prefix.
    fn expand(&self) -> Result<(Scalar, [u8; 32])> {
        let mut hasher = blake3::Hasher::new_derive_key(KEY_EXPANSION_CONTEXT);
        hasher.update(&self.0);
        let mut expanded = [0u8; 96];
        hasher.finalize_xof().fill(&mut expanded);

        let scalar: Scalar = reduce_be_bytes(&expanded[..64]);
        if bool::from(scalar.is_zero()) {
            return Err(IdentityError::SigningFailed(
                "private key expands to the zero scalar".into(),
            ));
        }
        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&expanded[64..]);
        Ok((scalar, prefix))
    }

    pub fn public(&self) -> Result<PublicKey> {
        let (scalar, _) = self.expand()?;
        PublicKey::from_point(&(G1::generator() * scalar).to_affine())
            .ok_or_else(|| IdentityError::SigningFailed("public key is the identity point".into()))
    }

    /// Sign one field element.
    pub fn sign(&self, message: &Fr) -> Result<Signature> {
        let (scalar, prefix) = self.expand()?;
        let public = PublicKey::from_point(&(G1::generator() * scalar).to_affine()).ok_or_else(
            || IdentityError::SigningFailed("public key is the identity point".into()),
        )?;

        let mut hasher = blake3::Hasher::new_derive_key(NONCE_CONTEXT);
        hasher.update(&prefix);
        hasher.update(&fr_to_bytes(message));
        let mut nonce_bytes = [0u8; 64];
        hasher.finalize_xof().fill(&mut nonce_bytes);
        let nonce: Scalar = reduce_be_bytes(&nonce_bytes);
        if bool::from(nonce.is_zero()) {
            return Err(IdentityError::SigningFailed("derived a zero nonce".into()));
        }

        let r_point = (G1::generator() * nonce).to_affine();
        let (r8x, r8y) = affine_xy(&r_point)
            .ok_or_else(|| IdentityError::SigningFailed("nonce point is the identity".into()))?;
        let challenge = challenge(&r8x, &r8y, &public, message);
        let s = nonce + challenge * scalar;

        Ok(Signature { r8x, r8y, s })
    }
}

/// Issuer public key `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "serde_fr::decimal")]
    x: Fr,
    #[serde(with = "serde_fr::decimal")]
    y: Fr,
}

impl PublicKey {
    /// Validates that `(x, y)` lies on the curve.
    pub fn from_xy(x: Fr, y: Fr) -> Result<Self> {
        let point: Option<G1Affine> = G1Affine::from_xy(x, y).into();
        match point {
            Some(_) => Ok(PublicKey { x, y }),
            None => Err(IdentityError::Encoding("public key is not on the curve".into())),
        }
    }

    fn from_point(point: &G1Affine) -> Option<Self> {
        affine_xy(point).map(|(x, y)| PublicKey { x, y })
    }

    pub fn x(&self) -> Fr {
        self.x
    }

    pub fn y(&self) -> Fr {
        self.y
    }

    fn point(&self) -> Option<G1Affine> {
        G1Affine::from_xy(self.x, self.y).into()
    }

    pub fn verify(&self, message: &Fr, signature: &Signature) -> bool {
        let Some(public) = self.point() else {
            return false;
        };
        let r_point: Option<G1Affine> = G1Affine::from_xy(signature.r8x, signature.r8y).into();
        let Some(r_point) = r_point else {
            return false;
        };
        let challenge = challenge(&signature.r8x, &signature.r8y, self, message);
        G1::generator() * signature.s == G1::from(r_point) + G1::from(public) * challenge
    }
}

/// Signature components as the proof system names them: `R8x`, `R8y`, `S`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r8x: Fr,
    pub r8y: Fr,
    pub s: Scalar,
}

impl Signature {
    pub fn r8x_decimal(&self) -> String {
        field_to_decimal(&self.r8x)
    }

    pub fn r8y_decimal(&self) -> String {
        field_to_decimal(&self.r8y)
    }

    pub fn s_decimal(&self) -> String {
        field_to_decimal(&self.s)
    }

    /// `R8x || R8y || S`, each 32 bytes little-endian.
    pub fn to_bytes(&self) -> [u8; 96] {
        let mut bytes = [0u8; 96];
        bytes[..32].copy_from_slice(&fr_to_bytes(&self.r8x));
        bytes[32..64].copy_from_slice(&fr_to_bytes(&self.r8y));
        bytes[64..].copy_from_slice(&field_to_le_bytes(&self.s));
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 96]) -> Result<Self> {
        let part = |range: std::ops::Range<usize>| {
            let mut buf = [0u8; 32];
            buf.copy_from_slice(&bytes[range]);
            buf
        };
        let invalid = || IdentityError::Encoding("invalid signature encoding".into());
        Ok(Signature {
            r8x: field_from_le_bytes(&part(0..32)).ok_or_else(invalid)?,
            r8y: field_from_le_bytes(&part(32..64)).ok_or_else(invalid)?,
            s: field_from_le_bytes(&part(64..96)).ok_or_else(invalid)?,
        })
    }
}

fn affine_xy(point: &G1Affine) -> Option<(Fr, Fr)> {
    if bool::from(point.is_identity()) {
        return None;
    }
    Some((point.x, point.y))
}

fn challenge(r8x: &Fr, r8y: &Fr, public: &PublicKey, message: &Fr) -> Scalar {
    let c = poseidon_hash(&[*r8x, *r8y, public.x, public.y, *message]);
    let mut be = fr_to_bytes(&c);
    be.reverse();
    reduce_be_bytes(&be)
}
