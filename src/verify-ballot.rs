//! A simple CLI tool for checking a ballot offline.
//! This runs exactly the acceptance checks the ballot box applies, so a
//! ballot it accepts would be accepted by the server for the same election.

use std::fs;

use clap::{Arg, ArgAction, ArgMatches, Command};

use ballot_protocol::{
    parse_public_keys, validate, Submission, ValidatedBallot, ValidationError,
};

const PROGRAM_NAME: &str = "verify-ballot";

const ABOUT_TEXT: &str = "Verify an encrypted ballot against an election's public keys.

EXIT CODES:
     0: Ballot accepted.
   255: Ran successfully, but the ballot would be rejected.
 Other: Error.";

const PUBKEYS_PATH: &str = "PUBKEYS_PATH";
const BALLOT_PATH: &str = "BALLOT_PATH";
const CHECK_RESIDUES: &str = "check-residues";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(PUBKEYS_PATH)
                .help("The election's key file, as served by `GET /election/<election_id>/pubkeys`")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(BALLOT_PATH)
                .help("A submission body: `{\"vote\": ..., \"vote_hash\": ...}`")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(CHECK_RESIDUES)
                .long(CHECK_RESIDUES)
                .help("Also require every ciphertext component to be a quadratic residue")
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// The key file could not be used.
    Keys(String),
    /// The ballot was rejected for the contained reason.
    Rejected(ValidationError),
}

/// Run verification.
fn verify(
    pubkeys_path: &str,
    ballot_path: &str,
    check_residues: bool,
) -> Result<ValidatedBallot, Error> {
    let raw_keys = fs::read_to_string(pubkeys_path).map_err(|e| Error::IO(e.to_string()))?;
    let keys = parse_public_keys(&raw_keys).map_err(|e| Error::Keys(e.to_string()))?;
    let body = fs::read(ballot_path).map_err(|e| Error::IO(e.to_string()))?;

    let submission = Submission {
        election_id: "offline",
        voter_id: "offline",
        body: &body,
    };
    validate(&submission, Some(keys.as_slice()), check_residues).map_err(Error::Rejected)
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Required arguments are guaranteed to be present.
    let pubkeys_path: &String = args.get_one(PUBKEYS_PATH).unwrap();
    let ballot_path: &String = args.get_one(BALLOT_PATH).unwrap();
    let check_residues = args.get_flag(CHECK_RESIDUES);

    match verify(pubkeys_path, ballot_path, check_residues) {
        Ok(ballot) => {
            println!("Ballot accepted.");
            println!("Hash: {}", ballot.vote_hash);
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Keys(msg)) => {
            println!("Invalid key file: {msg}");
            1
        }
        Err(Error::Rejected(err)) => {
            println!("Ballot rejected: {err}");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
