use ballot_protocol::ValidatedBallot;
use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// One voter's latest accepted ballot in one election, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election_id: String,
    pub voter_id: String,
    /// Canonical ciphertext.
    pub vote: String,
    pub vote_hash: String,
    /// Address the latest write came from.
    pub ip: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified: DateTime<Utc>,
    /// Number of accepted writes so far, starting at 1.
    pub write_count: u32,
}

impl Ballot {
    /// The ballot created by the first accepted write.
    pub fn first(write: BallotWrite) -> Self {
        Self {
            election_id: write.election_id,
            voter_id: write.voter_id,
            vote: write.vote,
            vote_hash: write.vote_hash,
            ip: write.ip,
            created: write.at,
            modified: write.at,
            write_count: 1,
        }
    }

    /// Overwrite with a later accepted write.
    pub fn rewrite(&mut self, write: BallotWrite) {
        self.vote = write.vote;
        self.vote_hash = write.vote_hash;
        self.ip = write.ip;
        self.modified = write.at;
        self.write_count += 1;
    }
}

/// A validated ballot on its way into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotWrite {
    pub election_id: String,
    pub voter_id: String,
    pub vote: String,
    pub vote_hash: String,
    pub ip: String,
    pub at: DateTime<Utc>,
}

impl BallotWrite {
    pub fn new(ballot: ValidatedBallot, ip: impl Into<String>) -> Self {
        // Mongo keeps millisecond precision; truncate so both stores agree.
        let now = Utc::now();
        let at = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        Self {
            election_id: ballot.election_id,
            voter_id: ballot.voter_id,
            vote: ballot.vote,
            vote_hash: ballot.vote_hash,
            ip: ip.into(),
            at,
        }
    }
}

/// The publicly visible part of a stored ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub vote: String,
    pub vote_hash: String,
}

impl From<Ballot> for BallotReceipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            vote: ballot.vote,
            vote_hash: ballot.vote_hash,
        }
    }
}
