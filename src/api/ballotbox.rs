use ballot_protocol::{validate, Submission};
use chrono::{DateTime, Utc};
use log::info;
use rocket::{
    data::{Data, ToByteUnit},
    http::Status,
    response::content::RawJson,
    serde::json::Json,
    Route, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    auth::{SourceAddress, VoterAuth},
    ballot::{BallotReceipt, BallotWrite},
    election::ElectionRegistry,
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![post_vote, check_hash, election_config, election_pubkeys]
}

/// Response to an accepted ballot.
#[derive(Debug, Serialize, Deserialize)]
pub struct Updated {
    pub updated: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
#[post("/election/<election_id>/vote/<voter_id>", data = "<body>")]
async fn post_vote(
    election_id: &str,
    voter_id: &str,
    auth: std::result::Result<VoterAuth, Error>,
    source: SourceAddress,
    body: Data<'_>,
    config: &State<Config>,
    elections: &State<ElectionRegistry>,
    store: &State<Store>,
) -> Result<(Status, Json<Updated>)> {
    auth?.ensure_voter(election_id, voter_id)?;

    // Read the body, refusing anything over the limit.
    let body = body
        .open(config.max_ballot_size().bytes())
        .into_bytes()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read ballot: {e}")))?;
    if !body.is_complete() {
        return Err(Error::TooLarge(config.max_ballot_size()));
    }
    let body = body.into_inner();

    // Validation is pure CPU work, so keep it off the async workers.
    let keys = elections.public_keys(election_id);
    let check_residues = config.check_residues();
    let (election, voter) = (election_id.to_string(), voter_id.to_string());
    let validated = rocket::tokio::task::spawn_blocking(move || {
        let submission = Submission {
            election_id: &election,
            voter_id: &voter,
            body: &body,
        };
        validate(
            &submission,
            keys.as_deref().map(Vec::as_slice),
            check_residues,
        )
    })
    .await
    .map_err(|e| Error::Internal(format!("Validation task failed: {e}")))??;

    let ballot = store
        .submit(BallotWrite::new(validated, source.0), config.max_writes())
        .await?;
    info!(
        "Accepted ballot {} for voter {voter_id} in election {election_id} (write {})",
        ballot.vote_hash, ballot.write_count
    );

    Ok((
        Status::Accepted,
        Json(Updated {
            updated: ballot.modified,
        }),
    ))
}

#[get("/election/<election_id>/check-hash/<voter_id>/<vote_hash>")]
async fn check_hash(
    election_id: &str,
    voter_id: &str,
    vote_hash: &str,
    auth: std::result::Result<VoterAuth, Error>,
    store: &State<Store>,
) -> Result<Json<BallotReceipt>> {
    auth?.ensure_voter(election_id, voter_id)?;

    let ballot = store
        .lookup(election_id, voter_id, vote_hash)
        .await?
        .ok_or_else(|| Error::not_found(format!("Ballot with hash {vote_hash}")))?;

    Ok(Json(ballot.into()))
}

#[get("/election/<election_id>/config/<voter_id>")]
async fn election_config(
    election_id: &str,
    voter_id: &str,
    auth: std::result::Result<VoterAuth, Error>,
    elections: &State<ElectionRegistry>,
) -> Result<RawJson<String>> {
    auth?.ensure_voter(election_id, voter_id)?;

    elections
        .config(election_id)
        .map(|config| RawJson(config.to_string()))
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

#[get("/election/<election_id>/pubkeys")]
async fn election_pubkeys(
    election_id: &str,
    elections: &State<ElectionRegistry>,
) -> Result<RawJson<String>> {
    elections
        .public_keys_raw(election_id)
        .map(|keys| RawJson(keys.to_string()))
        .ok_or_else(|| Error::not_found(format!("Public keys for election {election_id}")))
}
