use num_bigint::BigInt;
use num_traits::One;
use serde::Deserialize;

use crate::{ballot::serde_decimal, error::KeyError};

/// One question's public key: a prime modulus and a generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElectionPublicKey {
    #[serde(with = "serde_decimal")]
    pub p: BigInt,
    #[serde(with = "serde_decimal")]
    pub g: BigInt,
}

impl ElectionPublicKey {
    pub fn new(p: BigInt, g: BigInt) -> Self {
        Self { p, g }
    }
}

/// Decode an election's key file: a JSON list of `{"p": .., "g": ..}`
/// objects with decimal string values, one per question. Other fields are
/// ignored.
pub fn parse_public_keys(raw: &str) -> Result<Vec<ElectionPublicKey>, KeyError> {
    let keys: Vec<ElectionPublicKey> = serde_json::from_str(raw)?;
    if keys.is_empty() {
        return Err(KeyError::Empty);
    }

    let two = BigInt::from(2);
    for (index, key) in keys.iter().enumerate() {
        if key.p <= two {
            return Err(KeyError::Modulus { index });
        }
        if key.g <= BigInt::one() || key.g >= key.p {
            return Err(KeyError::Generator { index });
        }
    }

    Ok(keys)
}
