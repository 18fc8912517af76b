use log::debug;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
};

use crate::error::{Error, Result};
use crate::model::{
    ballot::{Ballot, BallotWrite},
    store::BallotStore,
};

use super::{is_duplicate_key_error, Coll};

/// How many times an upsert that lost a first-insert race is reissued.
const MAX_UPSERT_ATTEMPTS: usize = 3;

#[rocket::async_trait]
impl BallotStore for Coll<Ballot> {
    async fn submit(&self, write: BallotWrite, max_writes: u32) -> Result<Ballot> {
        let voter = doc! {
            "election_id": &write.election_id,
            "voter_id": &write.voter_id,
        };
        // A document at the limit does not match, so the upsert tries to
        // insert a second one and trips the unique index instead.
        let mut filter = voter.clone();
        filter.insert("write_count", doc! { "$lt": i64::from(max_writes) });

        let at = BsonDateTime::from_chrono(write.at);
        let update = doc! {
            "$set": {
                "vote": &write.vote,
                "vote_hash": &write.vote_hash,
                "ip": &write.ip,
                "modified": at,
            },
            "$inc": { "write_count": 1 },
            "$setOnInsert": { "created": at },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            let result = self
                .find_one_and_update(filter.clone(), update.clone(), options.clone())
                .await;
            if !is_duplicate_key_error(result.as_ref()) {
                return result?.ok_or_else(|| {
                    Error::Internal("Ballot upsert returned no document".to_string())
                });
            }

            let existing = self.find_one(voter.clone(), None).await?;
            if existing.map_or(false, |ballot| ballot.write_count >= max_writes) {
                return Err(Error::CapacityExceeded(max_writes));
            }
            debug!(
                "Ballot upsert for voter {} raced a concurrent insert (attempt {attempt})",
                write.voter_id
            );
        }

        Err(Error::Internal(format!(
            "Ballot upsert did not settle after {MAX_UPSERT_ATTEMPTS} attempts"
        )))
    }

    async fn lookup(
        &self,
        election_id: &str,
        voter_id: &str,
        vote_hash: &str,
    ) -> Result<Option<Ballot>> {
        let filter = doc! {
            "election_id": election_id,
            "voter_id": voter_id,
            "vote_hash": vote_hash,
        };
        self.find_one(filter, None).await.map_err(Error::DbLookup)
    }
}
