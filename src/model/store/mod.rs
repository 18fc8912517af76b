//! Persistence for accepted ballots.
//!
//! Both implementations enforce the per-voter write limit atomically: the
//! counter check and the write happen as one operation, so concurrent
//! submissions for the same voter can never skip or exceed it.

use std::ops::Deref;

use crate::error::Result;
use crate::model::ballot::{Ballot, BallotWrite};

mod memory;

pub use memory::MemoryStore;

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Store `write` as the voter's ballot.
    ///
    /// Creates the ballot with a write count of 1, or replaces the ciphertext
    /// and hash and increments the count if it is below `max_writes`.
    /// Otherwise fails with [`crate::error::Error::CapacityExceeded`] and
    /// leaves the stored ballot untouched.
    async fn submit(&self, write: BallotWrite, max_writes: u32) -> Result<Ballot>;

    /// The voter's ballot, if its current hash is `vote_hash`.
    async fn lookup(
        &self,
        election_id: &str,
        voter_id: &str,
        vote_hash: &str,
    ) -> Result<Option<Ballot>>;
}

/// The ballot store in use, held in managed state.
pub struct Store(Box<dyn BallotStore>);

impl Store {
    pub fn new(store: impl BallotStore + 'static) -> Self {
        Self(Box::new(store))
    }

    pub fn memory() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl Deref for Store {
    type Target = dyn BallotStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
