//! Serde adapters for `Fr`.
//!
//! `decimal` is the encoding the downstream proof system reads; `hex` is the
//! compact little-endian form used for storage records.

/// Fr as a base-10 string.
pub mod decimal {
    use halo2curves_axiom::bn256::Fr;
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    use crate::{fr_from_decimal, fr_to_decimal};

    pub fn serialize<S>(fr: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&fr_to_decimal(fr))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FrVisitor;

        impl de::Visitor<'_> for FrVisitor {
            type Value = Fr;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal field element string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                fr_from_decimal(v).map_err(E::custom)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Fr::from(v))
            }
        }

        deserializer.deserialize_any(FrVisitor)
    }
}

/// `Vec<Fr>` as an array of base-10 strings.
pub mod decimal_vec {
    use halo2curves_axiom::bn256::Fr;
    use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    use crate::{fr_from_decimal, fr_to_decimal};

    pub fn serialize<S>(values: &[Fr], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&fr_to_decimal(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Fr>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|text| fr_from_decimal(text).map_err(de::Error::custom))
            .collect()
    }
}

/// Fr as 32-byte little-endian hex (matching `to_repr`), `0x` prefix optional on input.
pub mod hex {
    use halo2curves_axiom::bn256::Fr;
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    use crate::{fr_from_bytes, fr_to_bytes};

    pub fn serialize<S>(fr: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", ::hex::encode(fr_to_bytes(fr))))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FrVisitor;

        impl de::Visitor<'_> for FrVisitor {
            type Value = Fr;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 32-byte hex string (with or without 0x prefix)")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let mut bytes = [0u8; 32];
                ::hex::decode_to_slice(v.strip_prefix("0x").unwrap_or(v), &mut bytes)
                    .map_err(E::custom)?;
                fr_from_bytes(&bytes).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FrVisitor)
    }
}

#[cfg(test)]
mod tests {
    use halo2curves_axiom::bn256::Fr;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::decimal")]
        dec: Fr,
        #[serde(with = "super::hex")]
        hex: Fr,
    }

    #[test]
    fn sample_json_shape() {
        let sample = Sample {
            dec: Fr::from(1234u64),
            hex: Fr::from(1u64),
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["dec"], "1234");
        assert_eq!(
            json["hex"],
            "0x0100000000000000000000000000000000000000000000000000000000000000"
        );
        let back: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn hex_rejects_short_input() {
        let json = serde_json::json!({ "dec": "1", "hex": "0x01" });
        assert!(serde_json::from_value::<Sample>(json).is_err());
    }

    #[test]
    fn hex_accepts_unprefixed_and_rejects_non_hex() {
        let digits = format!("02{}", "00".repeat(31));
        let json = serde_json::json!({ "dec": "1", "hex": digits });
        let sample: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(sample.hex, Fr::from(2u64));

        let json = serde_json::json!({ "dec": "1", "hex": format!("zz{}", "00".repeat(31)) });
        assert!(serde_json::from_value::<Sample>(json).is_err());
    }

    #[test]
    fn hex_rejects_values_above_the_modulus() {
        let json = serde_json::json!({ "dec": "1", "hex": "ff".repeat(32) });
        assert!(serde_json::from_value::<Sample>(json).is_err());
    }
}
