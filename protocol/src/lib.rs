//! Acceptance checks for encrypted ballots.
//!
//! Everything in this crate is pure, synchronous computation: a submission
//! is parsed, structurally checked, optionally residue-checked, its proofs of
//! knowledge are verified, and finally it is re-serialized canonically and
//! bound to the voter's claimed hash. Nothing here touches storage.

pub mod ballot;
pub mod error;
pub mod keys;
pub mod numeric;
pub mod proof;
pub mod validation;

pub use ballot::{
    canonicalize, parse_ballot, Choice, ElectionHash, EncryptedVote, Popk, ELECTION_HASH_TAG,
    VOTE_VERSION,
};
pub use error::{Component, FormatError, KeyError, ValidationError};
pub use keys::{parse_public_keys, ElectionPublicKey};
pub use proof::verify_popk;
pub use validation::{bind_hash, validate, Submission, ValidatedBallot, VoteEnvelope};
