use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    ballot::{canonicalize, parse_ballot, EncryptedVote, ELECTION_HASH_TAG, VOTE_VERSION},
    error::{Component, FormatError, ValidationError},
    keys::ElectionPublicKey,
    numeric::{is_quadratic_residue, sha256_hex},
    proof::verify_popk,
};

/// The outer submission body: the ciphertext as a JSON string and the hash
/// the voter claims it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEnvelope {
    pub vote: String,
    pub vote_hash: String,
}

/// A submission together with the routing identifiers supplied by the
/// boundary layer.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub election_id: &'a str,
    pub voter_id: &'a str,
    pub body: &'a [u8],
}

/// A ballot that passed every check, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBallot {
    pub election_id: String,
    pub voter_id: String,
    /// Canonical serialization of the ciphertext; this, not the voter's
    /// original bytes, is what gets stored.
    pub vote: String,
    /// The voter's claimed hash, now known to match `vote`.
    pub vote_hash: String,
}

/// Check that `canonical` hashes to `claimed`.
pub fn bind_hash(claimed: &str, canonical: &[u8]) -> Result<(), ValidationError> {
    let computed = sha256_hex(canonical);
    if computed != claimed {
        return Err(ValidationError::HashMismatch {
            claimed: claimed.to_string(),
            computed,
        });
    }
    Ok(())
}

/// Run the full acceptance pipeline on a submission, stopping at the first
/// failure.
///
/// `keys` are the election's public keys, or `None` if the election is not
/// known. With `check_residues` off, the proofs of knowledge are the only
/// guarantee on the ciphertexts.
pub fn validate(
    submission: &Submission<'_>,
    keys: Option<&[ElectionPublicKey]>,
    check_residues: bool,
) -> Result<ValidatedBallot, ValidationError> {
    let envelope: VoteEnvelope = serde_json::from_slice(submission.body)?;
    let keys = keys.ok_or_else(|| unknown_election(submission))?;

    let vote = parse_ballot(envelope.vote.as_bytes())?;
    check_structure(&vote)?;
    if vote.choices.len() != keys.len() {
        debug!(
            "Ballot for election '{}' has {} choices but the election has {} keys",
            submission.election_id,
            vote.choices.len(),
            keys.len()
        );
        return Err(unknown_election(submission));
    }

    if check_residues {
        for (index, (choice, key)) in vote.choices.iter().zip(keys).enumerate() {
            if !is_quadratic_residue(&choice.alpha, &key.p) {
                return Err(ValidationError::Residue {
                    index,
                    component: Component::Alpha,
                });
            }
            if !is_quadratic_residue(&choice.beta, &key.p) {
                return Err(ValidationError::Residue {
                    index,
                    component: Component::Beta,
                });
            }
        }
    }

    for (index, ((choice, proof), key)) in vote
        .choices
        .iter()
        .zip(&vote.proofs)
        .zip(keys)
        .enumerate()
    {
        verify_popk(index, choice, proof, key)?;
    }

    let canonical = canonicalize(&vote);
    bind_hash(&envelope.vote_hash, &canonical)?;

    Ok(ValidatedBallot {
        election_id: submission.election_id.to_string(),
        voter_id: submission.voter_id.to_string(),
        vote: String::from_utf8(canonical).map_err(|e| ValidationError::Parse(e.to_string()))?,
        vote_hash: envelope.vote_hash,
    })
}

fn unknown_election(submission: &Submission<'_>) -> ValidationError {
    ValidationError::UnknownElection(submission.election_id.to_string())
}

/// Tag, binding, date and count checks.
fn check_structure(vote: &EncryptedVote) -> Result<(), FormatError> {
    if vote.version != VOTE_VERSION {
        return Err(FormatError::Version(vote.version.clone()));
    }
    let election_hash = vote
        .election_hash
        .as_ref()
        .ok_or(FormatError::MissingElectionHash)?;
    if election_hash.tag != ELECTION_HASH_TAG {
        return Err(FormatError::ElectionHashTag(election_hash.tag.clone()));
    }
    if vote.issue_date.is_empty() {
        return Err(FormatError::MissingIssueDate);
    }
    if vote.choices.len() != vote.proofs.len() {
        return Err(FormatError::CountMismatch {
            choices: vote.choices.len(),
            proofs: vote.proofs.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::keys::parse_public_keys;

    const V1: &str = include_str!("../test_data/ballot_v1.json");
    const V2: &str = include_str!("../test_data/ballot_v2.json");
    const NON_RESIDUE: &str = include_str!("../test_data/ballot_non_residue.json");

    fn keys() -> Vec<ElectionPublicKey> {
        parse_public_keys(include_str!("../test_data/keys.json")).unwrap()
    }

    fn submit(body: &[u8], check_residues: bool) -> Result<ValidatedBallot, ValidationError> {
        let submission = Submission {
            election_id: "42",
            voter_id: "7",
            body,
        };
        let keys = keys();
        validate(&submission, Some(keys.as_slice()), check_residues)
    }

    /// Rewrite the inner ciphertext of an envelope, keeping the claimed hash.
    fn with_vote(envelope: &str, edit: impl FnOnce(&mut Value)) -> Vec<u8> {
        let mut envelope: VoteEnvelope = serde_json::from_str(envelope).unwrap();
        let mut vote: Value = serde_json::from_str(&envelope.vote).unwrap();
        edit(&mut vote);
        envelope.vote = vote.to_string();
        serde_json::to_vec(&envelope).unwrap()
    }

    /// Rewrite the inner ciphertext and re-hash it, so only the edit matters.
    fn with_vote_rehashed(envelope: &str, edit: impl FnOnce(&mut Value)) -> Vec<u8> {
        let mut envelope: VoteEnvelope =
            serde_json::from_slice(&with_vote(envelope, edit)).unwrap();
        envelope.vote_hash = sha256_hex(&envelope.vote);
        serde_json::to_vec(&envelope).unwrap()
    }

    #[test]
    fn accept_valid_ballots() {
        for raw in [V1, V2] {
            let ballot = submit(raw.as_bytes(), true).unwrap();
            let envelope: VoteEnvelope = serde_json::from_str(raw).unwrap();
            assert_eq!(ballot.election_id, "42");
            assert_eq!(ballot.voter_id, "7");
            assert_eq!(ballot.vote, envelope.vote);
            assert_eq!(ballot.vote_hash, envelope.vote_hash);
            assert_eq!(sha256_hex(&ballot.vote), ballot.vote_hash);
        }
    }

    #[test]
    fn stored_vote_is_canonical() {
        // Same ballot with shuffled fields, whitespace and padded integers.
        let envelope: VoteEnvelope = serde_json::from_str(V1).unwrap();
        let vote: Value = serde_json::from_str(&envelope.vote).unwrap();
        let alpha = vote["choices"][0]["alpha"].as_str().unwrap();
        let messy = format!(
            "{{ \"proofs\": {},\n \"issue_date\": \"05/12/2014\", \"election_hash\": {},\n \
             \"choices\": [{{\"beta\": {}, \"alpha\": \"000{alpha}\"}}, {}], \"a\": \"encrypted-vote-v1\" }}",
            vote["proofs"], vote["election_hash"], vote["choices"][0]["beta"], vote["choices"][1],
        );
        let body = json!({ "vote": messy, "vote_hash": envelope.vote_hash }).to_string();

        let ballot = submit(body.as_bytes(), true).unwrap();
        assert_eq!(ballot.vote, envelope.vote);
    }

    #[test]
    fn malformed_envelope() {
        assert!(matches!(submit(b"not json", true), Err(ValidationError::Parse(_))));
        assert!(matches!(
            submit(br#"{"vote_hash": "abc"}"#, true),
            Err(ValidationError::Parse(_))
        ));
        assert!(matches!(
            submit(br#"{"vote": "{}"}"#, true),
            Err(ValidationError::Parse(_))
        ));
        assert!(matches!(
            submit(br#"{"vote": "not json", "vote_hash": "abc"}"#, true),
            Err(ValidationError::Parse(_))
        ));
    }

    #[test]
    fn malformed_integer() {
        let body = with_vote(V1, |vote| vote["proofs"][1]["response"] = json!("12x"));
        assert!(matches!(submit(&body, true), Err(ValidationError::Parse(_))));
    }

    #[test]
    fn unknown_election() {
        let submission = Submission {
            election_id: "nope",
            voter_id: "7",
            body: V1.as_bytes(),
        };
        assert_eq!(
            validate(&submission, None, true),
            Err(ValidationError::UnknownElection("nope".to_string()))
        );
    }

    #[test]
    fn key_count_mismatch_is_unknown_election() {
        let keys = keys();
        let submission = Submission {
            election_id: "42",
            voter_id: "7",
            body: V1.as_bytes(),
        };
        assert_eq!(
            validate(&submission, Some(&keys[..1]), true),
            Err(ValidationError::UnknownElection("42".to_string()))
        );
    }

    #[test]
    fn wrong_version() {
        let body = with_vote(V1, |vote| vote["a"] = json!("encrypted-vote-v0"));
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::Format(FormatError::Version("encrypted-vote-v0".to_string())))
        );
    }

    #[test]
    fn missing_election_hash() {
        let body = with_vote(V1, |vote| {
            vote.as_object_mut().unwrap().remove("election_hash");
        });
        assert_eq!(submit(&body, true), Err(ValidationError::Format(FormatError::MissingElectionHash)));
    }

    #[test]
    fn wrong_election_hash_tag() {
        let body = with_vote(V1, |vote| vote["election_hash"]["a"] = json!("hash/md5/value"));
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::Format(FormatError::ElectionHashTag("hash/md5/value".to_string())))
        );
    }

    #[test]
    fn missing_issue_date() {
        let body = with_vote(V1, |vote| vote["issue_date"] = json!(""));
        assert_eq!(submit(&body, true), Err(ValidationError::Format(FormatError::MissingIssueDate)));
    }

    #[test]
    fn choice_proof_count_mismatch() {
        // Two choices, one proof: rejected before any proof is checked.
        let body = with_vote(V1, |vote| {
            vote["proofs"].as_array_mut().unwrap().pop();
        });
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::Format(FormatError::CountMismatch {
                choices: 2,
                proofs: 1
            }
            ))
        );
    }

    #[test]
    fn residue_toggle() {
        assert_eq!(
            submit(NON_RESIDUE.as_bytes(), true),
            Err(ValidationError::Residue {
                index: 0,
                component: Component::Alpha
            })
        );
        let ballot = submit(NON_RESIDUE.as_bytes(), false).unwrap();
        let envelope: VoteEnvelope = serde_json::from_str(NON_RESIDUE).unwrap();
        assert_eq!(ballot.vote_hash, envelope.vote_hash);
    }

    #[test]
    fn non_residue_beta() {
        // p = 3 mod 4, so negating beta flips its Legendre symbol. The proof
        // only covers alpha, so it still verifies.
        let p = keys()[1].p.clone();
        let body = with_vote_rehashed(V1, |vote| {
            let beta: num_bigint::BigInt = vote["choices"][1]["beta"]
                .as_str()
                .unwrap()
                .parse()
                .unwrap();
            vote["choices"][1]["beta"] = json!((&p - beta).to_string());
        });
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::Residue {
                index: 1,
                component: Component::Beta
            })
        );
        assert!(submit(&body, false).is_ok());
    }

    #[test]
    fn tampered_proof() {
        let body = with_vote_rehashed(V1, |vote| {
            let response = vote["proofs"][1]["response"].as_str().unwrap();
            let tampered = response.parse::<num_bigint::BigInt>().unwrap() + 1u32;
            vote["proofs"][1]["response"] = json!(tampered.to_string());
        });
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::ProofEquationFailed { index: 1 })
        );
    }

    #[test]
    fn proofs_swapped_between_choices() {
        let body = with_vote_rehashed(V1, |vote| {
            vote["proofs"].as_array_mut().unwrap().swap(0, 1);
        });
        assert_eq!(
            submit(&body, true),
            Err(ValidationError::ProofChallengeMismatch { index: 0 })
        );
    }

    #[test]
    fn hash_mismatch() {
        let envelope: VoteEnvelope = serde_json::from_str(V1).unwrap();
        let other: VoteEnvelope = serde_json::from_str(V2).unwrap();
        let body = serde_json::to_vec(&VoteEnvelope {
            vote: envelope.vote,
            vote_hash: other.vote_hash.clone(),
        })
        .unwrap();
        assert!(matches!(
            submit(&body, true),
            Err(ValidationError::HashMismatch { claimed, .. }) if claimed == other.vote_hash
        ));
    }

    #[test]
    fn hash_binds_every_digit() {
        let envelope: VoteEnvelope = serde_json::from_str(V1).unwrap();
        let vote = parse_ballot(envelope.vote.as_bytes()).unwrap();
        let fields = |vote: &EncryptedVote| {
            let mut fields = Vec::new();
            for choice in &vote.choices {
                fields.extend([choice.alpha.clone(), choice.beta.clone()]);
            }
            for proof in &vote.proofs {
                fields.extend([
                    proof.challenge.clone(),
                    proof.commitment.clone(),
                    proof.response.clone(),
                ]);
            }
            fields
        };
        let count = fields(&vote).len();
        assert_eq!(count, 10);

        for field in 0..count {
            let mut tampered = vote.clone();
            let value = match field {
                f if f < 4 => {
                    let choice = &mut tampered.choices[f / 2];
                    if f % 2 == 0 {
                        &mut choice.alpha
                    } else {
                        &mut choice.beta
                    }
                }
                f => {
                    let proof = &mut tampered.proofs[(f - 4) / 3];
                    match (f - 4) % 3 {
                        0 => &mut proof.challenge,
                        1 => &mut proof.commitment,
                        _ => &mut proof.response,
                    }
                }
            };
            *value += 1u32;
            assert_ne!(fields(&tampered), fields(&vote));
            assert!(bind_hash(&envelope.vote_hash, &canonicalize(&tampered)).is_err());
        }
        bind_hash(&envelope.vote_hash, &canonicalize(&vote)).unwrap();
    }
}
