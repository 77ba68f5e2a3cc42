//! Claim codec.
//!
//! A claim is eight field-element slots, four index slots that key it in the
//! claims tree and four value slots that do not:
//!
//! ```text
//! i0: schema hash (bytes 0..16) | flags (byte 16) | version (bytes 20..24)
//! i1: subject identifier when the subject sits in the index
//! i2, i3: index data A/B
//! v0: revocation nonce (bytes 0..8) | expiration (bytes 8..16)
//! v1: subject identifier when the subject sits in the value
//! v2, v3: value data A/B
//! ```
//!
//! Flags: bits 0..2 subject position, bit 3 expiration present, bit 4 updatable.

use halo2curves_axiom::bn256::Fr;
use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};
use zkid_common::{
    fr_from_bytes, fr_from_decimal, fr_from_le_slice, fr_to_bytes, fr_to_decimal, is_zero,
    poseidon_hash,
};

use crate::error::{IdentityError, Result};
use crate::id::Identifier;
use crate::schema::{SchemaHash, SCHEMA_HASH_LEN};

pub const SLOT_COUNT: usize = 8;
pub const MAX_DATA_SLOTS: usize = 2;

const FLAGS_BYTE: usize = 16;
const VERSION_BYTES: std::ops::Range<usize> = 20..24;
const SUBJECT_MASK: u8 = 0b0000_0111;
const SUBJECT_SELF: u8 = 0b000;
const SUBJECT_OTHER_INDEX: u8 = 0b010;
const SUBJECT_OTHER_VALUE: u8 = 0b011;
const EXPIRATION_FLAG: u8 = 1 << 3;
const UPDATABLE_FLAG: u8 = 1 << 4;

/// Who the claim is about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Subject {
    /// The issuing identity itself (no subject slot).
    #[default]
    Issuer,
    /// Another identity, stored in index slot `i1` (part of the tree key).
    OtherIndex(Identifier),
    /// Another identity, stored in value slot `v1`.
    OtherValue(Identifier),
}

/// Semantic fields of a claim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimOptions {
    pub subject: Subject,
    /// Up to two elements, encoded into `i2`, `i3`.
    pub index_data: Vec<Fr>,
    /// Up to two elements, encoded into `v2`, `v3`.
    pub value_data: Vec<Fr>,
    /// Must be non-zero.
    pub revocation_nonce: u64,
    /// Unix seconds. Sets the expiration flag.
    pub expiration: Option<u64>,
    pub updatable: bool,
    pub version: u32,
}

impl ClaimOptions {
    pub fn new(revocation_nonce: u64) -> Self {
        Self {
            revocation_nonce,
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_index_data(mut self, data: impl IntoIterator<Item = Fr>) -> Self {
        self.index_data = data.into_iter().collect();
        self
    }

    pub fn with_value_data(mut self, data: impl IntoIterator<Item = Fr>) -> Self {
        self.value_data = data.into_iter().collect();
        self
    }

    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// Interpret raw bytes (little-endian, at most 32) as a data slot.
pub fn data_slot_from_bytes(bytes: &[u8]) -> Result<Fr> {
    fr_from_le_slice(bytes).map_err(|err| {
        IdentityError::Encoding(format!("data slot is not a field element: {}", err))
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Claim {
    slots: [Fr; SLOT_COUNT],
}

impl Claim {
    /// Encode a claim under `schema`.
    pub fn new(schema: SchemaHash, options: &ClaimOptions) -> Result<Self> {
        if options.revocation_nonce == 0 {
            return Err(IdentityError::Encoding("revocation nonce must be non-zero".into()));
        }
        if options.index_data.len() > MAX_DATA_SLOTS || options.value_data.len() > MAX_DATA_SLOTS {
            return Err(IdentityError::Encoding(format!(
                "at most {} index and {} value data slots, got {} and {}",
                MAX_DATA_SLOTS,
                MAX_DATA_SLOTS,
                options.index_data.len(),
                options.value_data.len()
            )));
        }

        let mut flags = match options.subject {
            Subject::Issuer => SUBJECT_SELF,
            Subject::OtherIndex(_) => SUBJECT_OTHER_INDEX,
            Subject::OtherValue(_) => SUBJECT_OTHER_VALUE,
        };
        if options.expiration.is_some() {
            flags |= EXPIRATION_FLAG;
        }
        if options.updatable {
            flags |= UPDATABLE_FLAG;
        }

        let mut header = [0u8; 32];
        header[..SCHEMA_HASH_LEN].copy_from_slice(&schema.0);
        header[FLAGS_BYTE] = flags;
        header[VERSION_BYTES].copy_from_slice(&options.version.to_le_bytes());

        let mut nonce_slot = [0u8; 32];
        nonce_slot[..8].copy_from_slice(&options.revocation_nonce.to_le_bytes());
        if let Some(expiration) = options.expiration {
            nonce_slot[8..16].copy_from_slice(&expiration.to_le_bytes());
        }

        let mut slots = [Fr::zero(); SLOT_COUNT];
        slots[0] = slot_from_bytes(&header)?;
        slots[4] = slot_from_bytes(&nonce_slot)?;
        match options.subject {
            Subject::Issuer => {}
            Subject::OtherIndex(id) => slots[1] = id.to_fr(),
            Subject::OtherValue(id) => slots[5] = id.to_fr(),
        }
        if options.subject != Subject::Issuer && is_zero(&slots[1]) && is_zero(&slots[5]) {
            return Err(IdentityError::Encoding("claim subject identifier is empty".into()));
        }
        for (slot, value) in slots[2..4].iter_mut().zip(&options.index_data) {
            *slot = *value;
        }
        for (slot, value) in slots[6..8].iter_mut().zip(&options.value_data) {
            *slot = *value;
        }

        Ok(Claim { slots })
    }

    /// Rebuild a claim from its eight slots, validating the header and nonce slot.
    pub fn from_slots(slots: [Fr; SLOT_COUNT]) -> Result<Self> {
        let claim = Claim { slots };
        let header = fr_to_bytes(&slots[0]);
        if header[FLAGS_BYTE + 1..VERSION_BYTES.start].iter().any(|b| *b != 0)
            || header[VERSION_BYTES.end..].iter().any(|b| *b != 0)
        {
            return Err(IdentityError::Encoding("claim header has non-zero reserved bytes".into()));
        }
        let nonce_slot = fr_to_bytes(&slots[4]);
        if nonce_slot[16..].iter().any(|b| *b != 0) {
            return Err(IdentityError::Encoding(
                "claim nonce slot has non-zero reserved bytes".into(),
            ));
        }
        if claim.flags() & EXPIRATION_FLAG == 0 && nonce_slot[8..16].iter().any(|b| *b != 0) {
            return Err(IdentityError::Encoding(
                "claim carries an expiration without the expiration flag".into(),
            ));
        }
        if claim.revocation_nonce() == 0 {
            return Err(IdentityError::Encoding("revocation nonce must be non-zero".into()));
        }
        claim.subject()?;
        Ok(claim)
    }

    pub fn slots(&self) -> &[Fr; SLOT_COUNT] {
        &self.slots
    }

    pub fn index_slots(&self) -> [Fr; 4] {
        [self.slots[0], self.slots[1], self.slots[2], self.slots[3]]
    }

    pub fn value_slots(&self) -> [Fr; 4] {
        [self.slots[4], self.slots[5], self.slots[6], self.slots[7]]
    }

    fn flags(&self) -> u8 {
        fr_to_bytes(&self.slots[0])[FLAGS_BYTE]
    }

    pub fn schema_hash(&self) -> SchemaHash {
        let header = fr_to_bytes(&self.slots[0]);
        let mut bytes = [0u8; SCHEMA_HASH_LEN];
        bytes.copy_from_slice(&header[..SCHEMA_HASH_LEN]);
        SchemaHash(bytes)
    }

    pub fn ensure_schema(&self, expected: &SchemaHash) -> Result<()> {
        let actual = self.schema_hash();
        if actual != *expected {
            return Err(IdentityError::Encoding(format!(
                "schema hash mismatch: expected {}, claim carries {}",
                expected, actual
            )));
        }
        Ok(())
    }

    pub fn subject(&self) -> Result<Subject> {
        match self.flags() & SUBJECT_MASK {
            SUBJECT_SELF => Ok(Subject::Issuer),
            SUBJECT_OTHER_INDEX => Ok(Subject::OtherIndex(subject_id(&self.slots[1])?)),
            SUBJECT_OTHER_VALUE => Ok(Subject::OtherValue(subject_id(&self.slots[5])?)),
            other => Err(IdentityError::Encoding(format!(
                "invalid subject position {:#05b}",
                other
            ))),
        }
    }

    pub fn version(&self) -> u32 {
        let header = fr_to_bytes(&self.slots[0]);
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&header[VERSION_BYTES]);
        u32::from_le_bytes(bytes)
    }

    pub fn is_updatable(&self) -> bool {
        self.flags() & UPDATABLE_FLAG != 0
    }

    pub fn revocation_nonce(&self) -> u64 {
        let slot = fr_to_bytes(&self.slots[4]);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&slot[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn expiration(&self) -> Option<u64> {
        if self.flags() & EXPIRATION_FLAG == 0 {
            return None;
        }
        let slot = fr_to_bytes(&self.slots[4]);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&slot[8..16]);
        Some(u64::from_le_bytes(bytes))
    }

    pub fn index_data(&self) -> [Fr; 2] {
        [self.slots[2], self.slots[3]]
    }

    pub fn value_data(&self) -> [Fr; 2] {
        [self.slots[6], self.slots[7]]
    }

    pub fn index_hash(&self) -> Fr {
        poseidon_hash(&self.index_slots())
    }

    pub fn value_hash(&self) -> Fr {
        poseidon_hash(&self.value_slots())
    }

    /// `(indexHash, valueHash)`: the claims-tree key and value.
    pub fn hi_hv(&self) -> (Fr, Fr) {
        (self.index_hash(), self.value_hash())
    }

    /// Message the issuer signs for this claim: `H(indexHash, valueHash)`.
    pub fn signing_message(&self) -> Fr {
        let (hi, hv) = self.hi_hv();
        poseidon_hash(&[hi, hv])
    }

    /// Slots as decimal strings, in `[i0..i3, v0..v3]` order.
    pub fn to_decimal_strings(&self) -> Vec<String> {
        self.slots.iter().map(fr_to_decimal).collect()
    }
}

fn slot_from_bytes(bytes: &[u8; 32]) -> Result<Fr> {
    fr_from_bytes(bytes).map_err(|err| IdentityError::Encoding(err.to_string()))
}

fn subject_id(slot: &Fr) -> Result<Identifier> {
    if is_zero(slot) {
        return Err(IdentityError::Encoding("claim subject slot is empty".into()));
    }
    Identifier::from_fr(slot)
}

impl Serialize for Claim {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(SLOT_COUNT))?;
        for slot in &self.slots {
            seq.serialize_element(&fr_to_decimal(slot))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Claim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let texts = Vec::<String>::deserialize(deserializer)?;
        if texts.len() != SLOT_COUNT {
            return Err(de::Error::invalid_length(texts.len(), &"8 claim slots"));
        }
        let mut slots = [Fr::zero(); SLOT_COUNT];
        for (slot, text) in slots.iter_mut().zip(&texts) {
            *slot = fr_from_decimal(text).map_err(de::Error::custom)?;
        }
        Claim::from_slots(slots).map_err(de::Error::custom)
    }
}
