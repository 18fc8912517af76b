//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given result is a duplicate key error.
///
/// Plain writes report these as write errors; `findAndModify` upserts report
/// them as command errors.
pub fn is_duplicate_key_error<T>(result: Result<T, &DbError>) -> bool {
    if let Err(err) = result {
        match *err.kind {
            ErrorKind::Write(WriteFailure::WriteError(ref e)) => return e.code == DUPLICATE_KEY,
            ErrorKind::Command(ref e) => return e.code == DUPLICATE_KEY,
            _ => {}
        }
    }
    false
}
