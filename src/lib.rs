#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, ElectionsFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Assemble the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(ElectionsFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
        .mount(api::BASE, api::routes())
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "test-shared-secret";

/// A server over the fixture elections with an in-memory store and at most
/// two writes per voter.
#[cfg(test)]
pub(crate) fn rocket_for_test() -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("election_dir", "test_data/elections"))
        .merge(("max_writes", 2))
        .merge(("check_residues", true))
        .merge(("shared_secret", TEST_SECRET))
        .merge(("session_expire", 3600))
        .merge(("max_ballot_size", 65536));
    rocket::custom(figment)
        .attach(ConfigFairing)
        .attach(ElectionsFairing)
        .attach(LoggerFairing)
        .manage(model::store::Store::memory())
        .mount(api::BASE, api::routes())
}

/// A freshly named database on the server at `db_uri` (default: localhost).
#[cfg(test)]
pub(crate) async fn test_database() -> mongodb::Database {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(db_uri).await.unwrap();
    let db = client.database(&config::get_database_name());
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    db
}
