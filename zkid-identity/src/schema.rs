//! Schema hashes: 16-byte identifiers of offline-registered claim schemas.

use std::fmt;

use halo2curves_axiom::bn256::Fr;
use sha3::{Digest, Keccak256};
use zkid_common::fr_from_le_slice;

use crate::error::{IdentityError, Result};

pub const SCHEMA_HASH_LEN: usize = 16;

/// Schema of authentication claims binding a public key to an identity.
pub const AUTH_SCHEMA_HASH_HEX: &str = "ca938857241db9451ea329256b9c06e5";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SchemaHash(pub [u8; SCHEMA_HASH_LEN]);

impl SchemaHash {
    pub const AUTH: SchemaHash = SchemaHash([
        0xca, 0x93, 0x88, 0x57, 0x24, 0x1d, 0xb9, 0x45, 0x1e, 0xa3, 0x29, 0x25, 0x6b, 0x9c, 0x06,
        0xe5,
    ]);

    pub fn auth() -> Self {
        Self::AUTH
    }

    /// Last 16 bytes of `keccak256(schema_document || type_name)`.
    pub fn for_type(schema_document: &[u8], type_name: &str) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(schema_document);
        hasher.update(type_name.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; SCHEMA_HASH_LEN];
        bytes.copy_from_slice(&digest[digest.len() - SCHEMA_HASH_LEN..]);
        SchemaHash(bytes)
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let decoded = hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|err| IdentityError::Encoding(format!("invalid schema hash hex: {}", err)))?;
        let bytes: [u8; SCHEMA_HASH_LEN] = decoded.as_slice().try_into().map_err(|_| {
            IdentityError::Encoding(format!(
                "schema hash must be {} bytes, got {}",
                SCHEMA_HASH_LEN,
                decoded.len()
            ))
        })?;
        Ok(SchemaHash(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The 16 bytes read as a little-endian integer.
    pub fn to_fr(&self) -> Fr {
        // 128 bits always fit below the modulus.
        fr_from_le_slice(&self.0).unwrap_or_else(|_| Fr::zero())
    }
}

impl fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkid_common::fr_to_decimal;

    #[test]
    fn auth_schema_matches_constant() {
        assert_eq!(SchemaHash::auth().to_hex(), AUTH_SCHEMA_HASH_HEX);
        assert_eq!(SchemaHash::from_hex(AUTH_SCHEMA_HASH_HEX).unwrap(), SchemaHash::auth());
    }

    #[test]
    fn type_schema_depends_on_document_and_name() {
        let doc = br#"{"@context":{"KYCAgeCredential":{}}}"#;
        let age = SchemaHash::for_type(doc, "KYCAgeCredential");
        assert_eq!(age, SchemaHash::for_type(doc, "KYCAgeCredential"));
        assert_ne!(age, SchemaHash::for_type(doc, "KYCCountryOfResidenceCredential"));
        assert_ne!(age, SchemaHash::for_type(b"{}", "KYCAgeCredential"));
    }

    #[test]
    fn field_form_is_little_endian() {
        let mut bytes = [0u8; SCHEMA_HASH_LEN];
        bytes[0] = 1;
        bytes[1] = 1;
        assert_eq!(fr_to_decimal(&SchemaHash(bytes).to_fr()), "257");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            SchemaHash::from_hex("ca93"),
            Err(IdentityError::Encoding(_))
        ));
        assert!(SchemaHash::from_hex("zz").is_err());
    }
}
