use std::fmt::Display;

use ballot_protocol::ValidationError;
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    /// A database failure while reading rather than writing.
    #[error("Lookup failed: {0}")]
    DbLookup(DbError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Maximum number of writes ({0}) reached")]
    CapacityExceeded(u32),
    #[error("Ballot larger than {0} bytes")]
    TooLarge(u64),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::CapacityExceeded(_) | Self::BadRequest(_) => {
                Status::BadRequest
            }
            Self::TooLarge(_) => Status::PayloadTooLarge,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_) | Self::DbLookup(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }

    /// Stable machine-readable classification, sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => match err {
                ValidationError::Parse(_) => "invalid-json",
                ValidationError::Format(_) => "invalid-format",
                ValidationError::Residue { .. } => "quadratic-non-residue",
                ValidationError::ProofChallengeMismatch { .. }
                | ValidationError::ProofEquationFailed { .. } => "invalid-proof",
                ValidationError::HashMismatch { .. } => "hash-mismatch",
                ValidationError::UnknownElection(_) => "vote-pks-not-found",
            },
            Self::CapacityExceeded(_) => "max-writes-exceeded",
            Self::TooLarge(_) => "ballot-too-large",
            Self::BadRequest(_) => "bad-request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not-found",
            Self::Db(_) => "error-upsert",
            Self::DbLookup(_) => "error-select",
            Self::Internal(_) => "internal-error",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        } else {
            debug!("Rejected {} {}: {self}", req.method(), req.uri());
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
