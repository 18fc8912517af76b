use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Mutex,
};

use crate::error::{Error, Result};
use crate::model::ballot::{Ballot, BallotWrite};

use super::BallotStore;

/// In-process store used when no database is configured. Everything is lost
/// on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ballots: Mutex<HashMap<(String, String), Ballot>>,
}

impl MemoryStore {
    fn ballots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), Ballot>>> {
        self.ballots
            .lock()
            .map_err(|_| Error::Internal("ballot store lock poisoned".to_string()))
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn submit(&self, write: BallotWrite, max_writes: u32) -> Result<Ballot> {
        let mut ballots = self.ballots()?;
        let key = (write.election_id.clone(), write.voter_id.clone());
        match ballots.entry(key) {
            Entry::Occupied(mut entry) => {
                let ballot = entry.get_mut();
                if ballot.write_count >= max_writes {
                    return Err(Error::CapacityExceeded(max_writes));
                }
                ballot.rewrite(write);
                Ok(ballot.clone())
            }
            Entry::Vacant(_) if max_writes == 0 => Err(Error::CapacityExceeded(max_writes)),
            Entry::Vacant(entry) => Ok(entry.insert(Ballot::first(write)).clone()),
        }
    }

    async fn lookup(
        &self,
        election_id: &str,
        voter_id: &str,
        vote_hash: &str,
    ) -> Result<Option<Ballot>> {
        let ballots = self.ballots()?;
        Ok(ballots
            .get(&(election_id.to_string(), voter_id.to_string()))
            .filter(|ballot| ballot.vote_hash == vote_hash)
            .cloned())
    }
}
