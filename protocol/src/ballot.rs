use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The only ballot schema version we accept.
pub const VOTE_VERSION: &str = "encrypted-vote-v1";

/// The only election hash type we accept.
pub const ELECTION_HASH_TAG: &str = "hash/sha256/value";

/// A decoded ciphertext payload.
///
/// Field declaration order is the canonical serialization order, so it must
/// not be rearranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVote {
    /// Schema version tag.
    #[serde(rename = "a", default)]
    pub version: String,
    /// One ciphertext per election question.
    pub choices: Vec<Choice>,
    /// Binding to the election this ballot was prepared for.
    #[serde(default)]
    pub election_hash: Option<ElectionHash>,
    #[serde(default)]
    pub issue_date: String,
    /// Proofs of knowledge, index-aligned with `choices`.
    pub proofs: Vec<Popk>,
}

/// The two ciphertext components for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(with = "serde_decimal")]
    pub alpha: BigInt,
    #[serde(with = "serde_decimal")]
    pub beta: BigInt,
}

/// A non-interactive proof of knowledge for one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Popk {
    #[serde(with = "serde_decimal")]
    pub challenge: BigInt,
    #[serde(with = "serde_decimal")]
    pub commitment: BigInt,
    #[serde(with = "serde_decimal")]
    pub response: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionHash {
    #[serde(rename = "a", default)]
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

/// Decode a ciphertext payload.
///
/// Only the shape is checked here: every integer field must be a decimal
/// string and `choices`/`proofs` must be present. Tags, counts and proofs are
/// left to [`crate::validate`].
pub fn parse_ballot(raw: &[u8]) -> Result<EncryptedVote, ValidationError> {
    Ok(serde_json::from_slice(raw)?)
}

/// Serialize a ballot in its canonical form: compact JSON, fields in
/// declaration order, integers in minimal decimal form, unknown input fields
/// dropped. Semantically equal ballots always produce identical bytes.
pub fn canonicalize(vote: &EncryptedVote) -> Vec<u8> {
    // Every field is a string, a list, or a struct of those; this cannot fail.
    serde_json::to_vec(vote).unwrap_or_default()
}

/// (De)serialisation of big integers as decimal strings.
pub(crate) mod serde_decimal {
    use num_bigint::BigInt;
    use serde::{
        de::{Error, Unexpected, Visitor},
        Deserializer, Serializer,
    };

    use crate::numeric::parse_decimal;

    pub fn serialize<S>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = BigInt;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(formatter, "a string of decimal digits")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            parse_decimal(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigInt, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(DecimalVisitor)
    }
}
