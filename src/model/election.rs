use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use ballot_protocol::{parse_public_keys, ElectionPublicKey, KeyError};
use rocket::serde::json::{serde_json, Value};
use thiserror::Error;

/// Name of the per-election configuration file.
pub const CONFIG_FILE: &str = "config.json";

/// Prefix of the per-election public key file; the election ID follows it.
pub const PUBLIC_KEYS_PREFIX: &str = "pk_";

/// Config key that overrides the directory-derived election ID.
pub const ELECTION_ID_KEY: &str = "election-id";

/// Everything known about one election. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ElectionMetadata {
    /// The config file, served verbatim.
    pub config: String,
    /// The key file, served verbatim. `None` if absent or invalid.
    pub public_keys_raw: Option<String>,
    /// Parsed keys, shared with validation workers.
    pub public_keys: Option<Arc<Vec<ElectionPublicKey>>>,
}

/// All elections loaded at startup, keyed by election ID.
#[derive(Debug, Default)]
pub struct ElectionRegistry {
    elections: HashMap<String, ElectionMetadata>,
}

impl ElectionRegistry {
    pub fn get(&self, election_id: &str) -> Option<&ElectionMetadata> {
        self.elections.get(election_id)
    }

    pub fn config(&self, election_id: &str) -> Option<&str> {
        self.get(election_id).map(|e| e.config.as_str())
    }

    pub fn public_keys_raw(&self, election_id: &str) -> Option<&str> {
        self.get(election_id)?.public_keys_raw.as_deref()
    }

    /// A cheap handle on the parsed keys, suitable for moving onto a worker.
    pub fn public_keys(&self, election_id: &str) -> Option<Arc<Vec<ElectionPublicKey>>> {
        self.get(election_id)?.public_keys.clone()
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }

    /// Load every election below `dir`.
    ///
    /// Only failing to list `dir` itself is an error. Problems with individual
    /// entries are recorded in the returned report and the entry is skipped.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> io::Result<(Self, LoadReport)> {
        let mut paths = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        paths.sort();

        let mut registry = Self::default();
        let mut report = LoadReport::default();
        for path in paths {
            if !path.is_dir() {
                continue;
            }
            let outcome = match load_election(&path) {
                Ok((election_id, _)) if registry.elections.contains_key(&election_id) => {
                    LoadOutcome::Skipped(LoadError::DuplicateId(election_id))
                }
                Ok((election_id, loaded)) => {
                    let outcome = match (&loaded.metadata.public_keys, loaded.keys_problem) {
                        (Some(keys), _) => LoadOutcome::Loaded {
                            election_id: election_id.clone(),
                            public_keys: keys.len(),
                        },
                        (None, reason) => LoadOutcome::ConfigOnly {
                            election_id: election_id.clone(),
                            reason: reason.unwrap_or(KeysProblem::Missing),
                        },
                    };
                    registry.elections.insert(election_id, loaded.metadata);
                    outcome
                }
                Err(err) => LoadOutcome::Skipped(err),
            };
            report.entries.push(LoadEntry { path, outcome });
        }

        Ok((registry, report))
    }
}

struct Loaded {
    metadata: ElectionMetadata,
    keys_problem: Option<KeysProblem>,
}

fn load_election(dir: &Path) -> Result<(String, Loaded), LoadError> {
    let config = fs::read_to_string(dir.join(CONFIG_FILE)).map_err(LoadError::ConfigUnreadable)?;
    let parsed: Value =
        serde_json::from_str(&config).map_err(|e| LoadError::ConfigMalformed(e.to_string()))?;
    if !parsed.is_object() {
        return Err(LoadError::ConfigMalformed("not a JSON object".to_string()));
    }

    let election_id = match parsed.get(ELECTION_ID_KEY) {
        None => dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(LoadError::NoElectionId)?,
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => return Err(LoadError::NoElectionId),
    };
    if election_id.is_empty() {
        return Err(LoadError::NoElectionId);
    }

    let keys_path = dir.join(format!("{PUBLIC_KEYS_PREFIX}{election_id}"));
    let (public_keys_raw, public_keys, keys_problem) = match fs::read_to_string(keys_path) {
        Ok(raw) => match parse_public_keys(&raw) {
            Ok(keys) => (Some(raw), Some(Arc::new(keys)), None),
            Err(err) => (None, None, Some(KeysProblem::Invalid(err))),
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => (None, None, None),
        Err(err) => (None, None, Some(KeysProblem::Unreadable(err.to_string()))),
    };

    Ok((
        election_id,
        Loaded {
            metadata: ElectionMetadata {
                config,
                public_keys_raw,
                public_keys,
            },
            keys_problem,
        },
    ))
}

/// Why an election directory was not loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unreadable config.json: {0}")]
    ConfigUnreadable(io::Error),
    #[error("malformed config.json: {0}")]
    ConfigMalformed(String),
    #[error("no usable election ID")]
    NoElectionId,
    #[error("election ID '{0}' already loaded")]
    DuplicateId(String),
}

/// Why an election was loaded without public keys.
#[derive(Debug, Error)]
pub enum KeysProblem {
    #[error("no key file")]
    Missing,
    #[error("unreadable key file: {0}")]
    Unreadable(String),
    #[error("invalid key file: {0}")]
    Invalid(KeyError),
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded { election_id: String, public_keys: usize },
    ConfigOnly { election_id: String, reason: KeysProblem },
    Skipped(LoadError),
}

impl Display for LoadOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded {
                election_id,
                public_keys,
            } => write!(f, "loaded election {election_id} with {public_keys} public keys"),
            Self::ConfigOnly {
                election_id,
                reason,
            } => write!(f, "loaded election {election_id} without public keys ({reason})"),
            Self::Skipped(err) => write!(f, "skipped: {err}"),
        }
    }
}

#[derive(Debug)]
pub struct LoadEntry {
    pub path: PathBuf,
    pub outcome: LoadOutcome,
}

/// What happened to each directory entry during loading, in name order.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub entries: Vec<LoadEntry>,
}

impl LoadReport {
    pub fn skipped(&self) -> impl Iterator<Item = &LoadEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, LoadOutcome::Skipped(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = "test_data/elections";

    fn outcome_for<'a>(report: &'a LoadReport, dir: &str) -> &'a LoadOutcome {
        &report
            .entries
            .iter()
            .find(|e| e.path.ends_with(dir))
            .unwrap()
            .outcome
    }

    #[test]
    fn load_fixture_directory() {
        let (registry, report) = ElectionRegistry::load_from_dir(FIXTURES).unwrap();

        // The README file is not an election.
        assert_eq!(report.entries.len(), 4);
        assert_eq!(registry.len(), 3);

        assert!(matches!(
            outcome_for(&report, "42"),
            LoadOutcome::Loaded { election_id, public_keys: 2 } if election_id == "42"
        ));
        assert!(registry.public_keys("42").is_some());
        assert!(registry.public_keys_raw("42").is_some());
        assert!(registry.config("42").unwrap().contains("municipal budget"));
    }

    #[test]
    fn election_id_overrides_directory_name() {
        let (registry, report) = ElectionRegistry::load_from_dir(FIXTURES).unwrap();
        assert!(registry.config("43").is_none());
        assert!(registry.config("budget-2015").is_some());
        assert!(matches!(
            outcome_for(&report, "43"),
            LoadOutcome::ConfigOnly {
                election_id,
                reason: KeysProblem::Invalid(KeyError::Generator { index: 0 }),
            } if election_id == "budget-2015"
        ));
        assert!(registry.public_keys("budget-2015").is_none());
        assert!(registry.public_keys_raw("budget-2015").is_none());
    }

    #[test]
    fn bad_entries_are_reported() {
        let (registry, report) = ElectionRegistry::load_from_dir(FIXTURES).unwrap();

        assert!(matches!(
            outcome_for(&report, "broken"),
            LoadOutcome::Skipped(LoadError::ConfigMalformed(_))
        ));
        assert!(registry.config("broken").is_none());
        assert_eq!(report.skipped().count(), 1);

        assert!(matches!(
            outcome_for(&report, "nokeys"),
            LoadOutcome::ConfigOnly {
                reason: KeysProblem::Missing,
                ..
            }
        ));
        assert!(registry.config("nokeys").is_some());
        assert!(registry.public_keys("nokeys").is_none());
    }

    #[test]
    fn entries_are_in_name_order() {
        let (_, report) = ElectionRegistry::load_from_dir(FIXTURES).unwrap();
        let names = report
            .entries
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["42", "43", "broken", "nokeys"]);
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let random: u32 = rand::random();
        let root = std::env::temp_dir().join(format!("ballotbox-elections-{random}"));
        for (dir, config) in [
            ("a", r#"{"election-id": 7, "title": "first"}"#),
            ("b", r#"{"election-id": "7", "title": "second"}"#),
        ] {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join(CONFIG_FILE), config).unwrap();
        }

        let result = ElectionRegistry::load_from_dir(&root);
        fs::remove_dir_all(&root).unwrap();
        let (registry, report) = result.unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.config("7").unwrap().contains("first"));
        assert!(matches!(
            &report.entries[1].outcome,
            LoadOutcome::Skipped(LoadError::DuplicateId(id)) if id == "7"
        ));
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(ElectionRegistry::load_from_dir("test_data/does-not-exist").is_err());
    }
}
