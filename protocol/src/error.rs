use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Which half of a ciphertext failed a check.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Component {
    Alpha,
    Beta,
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha => write!(f, "alpha"),
            Self::Beta => write!(f, "beta"),
        }
    }
}

/// Structural problems with a ballot that parsed successfully.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormatError {
    #[error("unsupported vote version '{0}'")]
    Version(String),
    #[error("missing election hash")]
    MissingElectionHash,
    #[error("unsupported election hash type '{0}'")]
    ElectionHashTag(String),
    #[error("missing issue date")]
    MissingIssueDate,
    #[error("{choices} choices but {proofs} proofs")]
    CountMismatch { choices: usize, proofs: usize },
}

/// Every way a submission can be rejected by [`crate::validate`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("Malformed ballot: {0}")]
    Parse(String),
    #[error("Invalid ballot format: {0}")]
    Format(#[from] FormatError),
    #[error("Choice {index}: {component} is a quadratic non-residue")]
    Residue { index: usize, component: Component },
    #[error("Proof {index}: challenge does not match its commitment")]
    ProofChallengeMismatch { index: usize },
    #[error("Proof {index}: response equation does not hold")]
    ProofEquationFailed { index: usize },
    #[error("Vote hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: String, computed: String },
    #[error("No usable public keys for election '{0}'")]
    UnknownElection(String),
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Errors decoding an election's public key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("key file contains no keys")]
    Empty,
    #[error("key {index}: modulus must be greater than 2")]
    Modulus { index: usize },
    #[error("key {index}: generator must lie strictly between 1 and the modulus")]
    Generator { index: usize },
}
