use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use sha2::{Digest, Sha256};

use crate::{
    ballot::{Choice, Popk},
    error::ValidationError,
    keys::ElectionPublicKey,
    numeric::mod_pow,
};

/// The Fiat-Shamir challenge for a ciphertext and commitment: the SHA-256
/// digest of `"<alpha>/<commitment>"` (decimal forms) read as a big-endian
/// unsigned integer, which is the same number as its hex digest in base 16.
pub fn expected_challenge(alpha: &BigInt, commitment: &BigInt) -> BigInt {
    let digest = Sha256::digest(format!("{alpha}/{commitment}").as_bytes());
    BigInt::from_bytes_be(Sign::Plus, &digest)
}

/// Verify the proof of knowledge for the choice at `index`.
///
/// The challenge is recomputed first; the response equation
/// `g^response = commitment * alpha^challenge (mod p)` is only meaningful for
/// an honestly derived challenge.
pub fn verify_popk(
    index: usize,
    choice: &Choice,
    proof: &Popk,
    key: &ElectionPublicKey,
) -> Result<(), ValidationError> {
    if proof.challenge != expected_challenge(&choice.alpha, &proof.commitment) {
        return Err(ValidationError::ProofChallengeMismatch { index });
    }

    let equation_failed = ValidationError::ProofEquationFailed { index };
    let lhs = mod_pow(&key.g, &proof.response, &key.p).ok_or(equation_failed.clone())?;
    let rhs = mod_pow(&choice.alpha, &proof.challenge, &key.p)
        .map(|power| (&proof.commitment * power).mod_floor(&key.p))
        .ok_or(equation_failed.clone())?;

    if lhs != rhs {
        return Err(equation_failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use num_traits::One;

    use super::*;
    use crate::{ballot::parse_ballot, keys::parse_public_keys, validation::VoteEnvelope};

    fn fixture() -> (Vec<Choice>, Vec<Popk>, Vec<ElectionPublicKey>) {
        let envelope: VoteEnvelope =
            serde_json::from_str(include_str!("../test_data/ballot_v1.json")).unwrap();
        let vote = parse_ballot(envelope.vote.as_bytes()).unwrap();
        let keys = parse_public_keys(include_str!("../test_data/keys.json")).unwrap();
        (vote.choices, vote.proofs, keys)
    }

    #[test]
    fn valid_proofs_verify() {
        let (choices, proofs, keys) = fixture();
        for i in 0..choices.len() {
            verify_popk(i, &choices[i], &proofs[i], &keys[i]).unwrap();
        }
    }

    #[test]
    fn challenge_matches_hex_digest() {
        let alpha = BigInt::from(5);
        let commitment = BigInt::from(7);
        let hex = crate::numeric::sha256_hex("5/7");
        assert_eq!(
            expected_challenge(&alpha, &commitment),
            BigInt::parse_bytes(hex.as_bytes(), 16).unwrap()
        );
    }

    #[test]
    fn tampered_challenge_fails() {
        let (choices, mut proofs, keys) = fixture();
        proofs[0].challenge += 1u32;
        assert_eq!(
            verify_popk(0, &choices[0], &proofs[0], &keys[0]),
            Err(ValidationError::ProofChallengeMismatch { index: 0 })
        );
    }

    #[test]
    fn tampered_commitment_fails() {
        let (choices, mut proofs, keys) = fixture();
        proofs[1].commitment += 1u32;
        assert_eq!(
            verify_popk(1, &choices[1], &proofs[1], &keys[1]),
            Err(ValidationError::ProofChallengeMismatch { index: 1 })
        );
    }

    #[test]
    fn tampered_response_fails() {
        let (choices, mut proofs, keys) = fixture();
        proofs[0].response += 1u32;
        assert_eq!(
            verify_popk(0, &choices[0], &proofs[0], &keys[0]),
            Err(ValidationError::ProofEquationFailed { index: 0 })
        );
    }

    #[test]
    fn negative_response_fails() {
        let (choices, mut proofs, keys) = fixture();
        proofs[0].response = -BigInt::one();
        assert_eq!(
            verify_popk(0, &choices[0], &proofs[0], &keys[0]),
            Err(ValidationError::ProofEquationFailed { index: 0 })
        );
    }

    #[test]
    fn wrong_key_fails() {
        let (choices, proofs, keys) = fixture();
        assert_eq!(
            verify_popk(0, &choices[0], &proofs[0], &keys[1]),
            Err(ValidationError::ProofEquationFailed { index: 0 })
        );
    }

    #[test]
    fn tampered_alpha_fails() {
        let (mut choices, proofs, keys) = fixture();
        choices[0].alpha += 1u32;
        assert_eq!(
            verify_popk(0, &choices[0], &proofs[0], &keys[0]),
            Err(ValidationError::ProofChallengeMismatch { index: 0 })
        );
    }
}
