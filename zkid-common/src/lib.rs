//! Shared primitives for the zkid identity crates.
//!
//! Everything that has to hash or encode a BN254 scalar the same way across
//! the tree engine, the claim codec and the proof-input builders lives here:
//! canonical byte/decimal conversions, the fixed Poseidon instance, and serde
//! adapters for field elements.

pub mod poseidon;
pub mod serde_fr;

use anyhow::{anyhow, ensure, Context, Result};
use halo2curves_axiom::{
    bn256::Fr,
    ff::{Field, PrimeField},
};
use num_bigint::BigUint;

pub use poseidon::{
    poseidon_hash, POSEIDON_FULL_ROUNDS, POSEIDON_PARTIAL_ROUNDS, POSEIDON_RATE, POSEIDON_T,
};

/// Little-endian canonical encoding of a scalar.
pub fn fr_to_bytes(fr: &Fr) -> [u8; 32] {
    field_to_le_bytes(fr)
}

/// Parse a little-endian canonical encoding; values >= the modulus are rejected.
pub fn fr_from_bytes(bytes: &[u8; 32]) -> Result<Fr> {
    field_from_le_bytes(bytes).ok_or_else(|| anyhow!("invalid bn256 scalar encoding"))
}

/// Interpret up to 32 little-endian bytes as a scalar. Shorter inputs are zero-extended.
pub fn fr_from_le_slice(bytes: &[u8]) -> Result<Fr> {
    ensure!(
        bytes.len() <= 32,
        "expected at most 32 bytes for a field element, got {}",
        bytes.len()
    );
    let mut buf = [0u8; 32];
    buf[..bytes.len()].copy_from_slice(bytes);
    fr_from_bytes(&buf)
}

pub fn reduce_be_bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    reduce_be_bytes(bytes)
}

/// Reduce an arbitrary-length big-endian byte string into any prime field.
pub fn reduce_be_bytes<F: PrimeField>(bytes: &[u8]) -> F {
    let mut acc = F::ZERO;
    let base = F::from(256);
    for byte in bytes.iter() {
        acc = acc * base + F::from(*byte as u64);
    }
    acc
}

pub fn field_to_le_bytes<F: PrimeField>(value: &F) -> [u8; 32] {
    let repr = value.to_repr();
    let mut bytes = [0u8; 32];
    let src = repr.as_ref();
    bytes[..src.len()].copy_from_slice(src);
    bytes
}

pub fn field_from_le_bytes<F: PrimeField>(bytes: &[u8; 32]) -> Option<F> {
    let mut repr = F::Repr::default();
    let dst = repr.as_mut();
    if dst.len() != bytes.len() {
        return None;
    }
    dst.copy_from_slice(bytes);
    F::from_repr(repr).into_option()
}

/// Base-10 rendering of the canonical integer behind a field element.
pub fn field_to_decimal<F: PrimeField>(value: &F) -> String {
    BigUint::from_bytes_le(&field_to_le_bytes(value)).to_string()
}

pub fn fr_to_decimal(fr: &Fr) -> String {
    field_to_decimal(fr)
}

pub fn fr_from_decimal(text: &str) -> Result<Fr> {
    let value = BigUint::parse_bytes(text.trim().as_bytes(), 10)
        .with_context(|| format!("'{}' is not a decimal integer", text))?;
    let le = value.to_bytes_le();
    ensure!(le.len() <= 32, "decimal value {} exceeds 256 bits", text);
    let mut bytes = [0u8; 32];
    bytes[..le.len()].copy_from_slice(&le);
    fr_from_bytes(&bytes)
        .with_context(|| format!("decimal value {} is not below the field modulus", text))
}

pub fn fr_to_u64(fr: &Fr) -> Result<u64> {
    let bytes = fr_to_bytes(fr);
    ensure!(
        bytes[8..].iter().all(|&b| b == 0),
        "field element does not fit in u64"
    );
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    Ok(u64::from_le_bytes(buf))
}

/// Bit `n` of the little-endian integer behind `fr`.
pub fn fr_bit(fr: &Fr, n: usize) -> bool {
    let bytes = fr_to_bytes(fr);
    bytes[n / 8] & (1 << (n % 8)) != 0
}

pub fn is_zero(fr: &Fr) -> bool {
    bool::from(fr.is_zero())
}
