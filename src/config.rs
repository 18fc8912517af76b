use std::path::{Path, PathBuf};

use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    ballot::Ballot,
    election::{ElectionRegistry, LoadOutcome},
    mongodb::{ensure_indexes_exist, Coll},
    store::Store,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    election_dir: PathBuf,
    max_writes: u32,
    check_residues: bool,
    session_expire: u64,
    max_ballot_size: u64,
    // secrets
    shared_secret: String,
}

impl Config {
    /// Directory holding one sub-directory per election.
    pub fn election_dir(&self) -> &Path {
        &self.election_dir
    }

    /// How many times a voter's ballot may be written, including the first.
    pub fn max_writes(&self) -> u32 {
        self.max_writes
    }

    /// Whether ciphertext components must be quadratic residues.
    pub fn check_residues(&self) -> bool {
        self.check_residues
    }

    /// Seconds a voter auth token stays valid after issue.
    pub fn session_expire(&self) -> u64 {
        self.session_expire
    }

    /// Largest accepted submission body, in bytes.
    pub fn max_ballot_size(&self) -> u64 {
        self.max_ballot_size
    }

    /// Secret key for voter auth HMACs.
    pub fn shared_secret(&self) -> &[u8] {
        self.shared_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.max_writes == 0 {
            error!("`max_writes` must be at least 1");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that loads every election below `election_dir` and places the
/// resulting [`ElectionRegistry`] into managed state.
pub struct ElectionsFairing;

#[rocket::async_trait]
impl Fairing for ElectionsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Elections",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Relies on `ConfigFairing` having run first.
        let Some(config) = rocket.state::<Config>() else {
            error!("Elections loaded before the application config");
            return Err(rocket);
        };
        let dir = config.election_dir().to_path_buf();

        info!("Loading elections from {}...", dir.display());
        let (registry, report) = match ElectionRegistry::load_from_dir(&dir) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to read election directory {}: {e}", dir.display());
                return Err(rocket);
            }
        };
        for entry in &report.entries {
            let path = entry.path.display();
            match entry.outcome {
                LoadOutcome::Loaded { .. } => info!("{path}: {}", entry.outcome),
                _ => warn!("{path}: {}", entry.outcome),
            }
        }
        info!("...{} elections loaded", registry.len());

        // Manage the state.
        rocket = rocket.manage(registry);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: Option<String>,
}

/// A fairing that chooses the ballot store. With a `db_uri` it connects to
/// MongoDB and ensures the indexes exist; without one ballots are kept in
/// memory.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let Some(db_uri) = config.db_uri else {
            warn!("No `db_uri` configured, ballots will only be kept in memory");
            rocket = rocket.manage(Store::memory());
            return Ok(rocket);
        };

        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let ballots = Coll::<Ballot>::from_db(&db);
        rocket = rocket.manage(client).manage(db).manage(Store::new(ballots));
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name() -> String {
    "ballotbox".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
