//! Stable identity identifiers derived from a genesis state.
//!
//! Layout: `type (2) || genesis (27) || checksum (2)`, where `genesis` is the
//! tail of the little-endian genesis state encoding and `checksum` is the u16
//! byte sum of `type || genesis`, stored little-endian.

use std::fmt;
use std::str::FromStr;

use halo2curves_axiom::bn256::Fr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zkid_common::{fr_from_le_slice, fr_to_bytes};

use crate::error::{IdentityError, Result};

pub const ID_LEN: usize = 31;
pub const GENESIS_LEN: usize = 27;

/// Two-byte identity type tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdType(pub [u8; 2]);

impl IdType {
    pub const DEFAULT: IdType = IdType([0x00, 0x00]);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; ID_LEN]);

fn checksum(id_type: &IdType, genesis: &[u8]) -> [u8; 2] {
    let sum = id_type
        .0
        .iter()
        .chain(genesis.iter())
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    sum.to_le_bytes()
}

impl Identifier {
    /// Derive the identifier of an identity from its genesis state.
    pub fn from_genesis_state(id_type: IdType, genesis_state: &Fr) -> Self {
        let state = fr_to_bytes(genesis_state);
        let genesis = &state[32 - GENESIS_LEN..];
        let mut bytes = [0u8; ID_LEN];
        bytes[..2].copy_from_slice(&id_type.0);
        bytes[2..2 + GENESIS_LEN].copy_from_slice(genesis);
        bytes[2 + GENESIS_LEN..].copy_from_slice(&checksum(&id_type, genesis));
        Identifier(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::Encoding(format!(
                "identifier must be {} bytes, got {}",
                ID_LEN,
                bytes.len()
            ))
        })?;
        let id = Identifier(bytes);
        if checksum(&id.id_type(), id.genesis()) != id.checksum() {
            return Err(IdentityError::Encoding(format!(
                "identifier {} has an invalid checksum",
                id
            )));
        }
        Ok(id)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn id_type(&self) -> IdType {
        IdType([self.0[0], self.0[1]])
    }

    pub fn genesis(&self) -> &[u8] {
        &self.0[2..2 + GENESIS_LEN]
    }

    pub fn checksum(&self) -> [u8; 2] {
        [self.0[ID_LEN - 2], self.0[ID_LEN - 1]]
    }

    /// True when this identifier was derived from `state`.
    pub fn matches_genesis_state(&self, state: &Fr) -> bool {
        Identifier::from_genesis_state(self.id_type(), state) == *self
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(text: &str) -> Result<Self> {
        let bytes = bs58::decode(text.trim())
            .into_vec()
            .map_err(|err| IdentityError::Encoding(format!("invalid base58 identifier: {}", err)))?;
        Self::from_bytes(&bytes)
    }

    /// Field form: the identifier bytes read as a little-endian integer.
    pub fn to_fr(&self) -> Fr {
        // 31 bytes are always below the modulus.
        fr_from_le_slice(&self.0).unwrap_or_else(|_| Fr::zero())
    }

    pub fn from_fr(value: &Fr) -> Result<Self> {
        let bytes = fr_to_bytes(value);
        if bytes[ID_LEN] != 0 {
            return Err(IdentityError::Encoding(
                "field element is wider than an identifier".into(),
            ));
        }
        Self::from_bytes(&bytes[..ID_LEN])
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_base58())
    }
}

impl FromStr for Identifier {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        Identifier::from_base58(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Identifier::from_base58(&text).map_err(de::Error::custom)
    }
}
