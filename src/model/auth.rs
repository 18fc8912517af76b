use chrono::Utc;
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use hmac::{Hmac, Mac};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use sha2::Sha256;

use crate::config::Config;
use crate::error::Error;

pub type HmacSha256 = Hmac<Sha256>;

const KHMAC_PREFIX: &str = "khmac:///sha-256;";

/// The permission a voter needs to act on their own ballot.
pub fn voter_permission(election_id: &str, voter_id: &str) -> String {
    format!("voter-{election_id}-{voter_id}")
}

/// Build an `Authorization` header value for `message`, which should be
/// `<permission>:<unix timestamp>`.
pub fn khmac_header(secret: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    let digest = HEXLOWER.encode(&mac.finalize().into_bytes());
    format!("{KHMAC_PREFIX}{digest}/{message}")
}

/// A voter's authenticated, unexpired token. Which ballot it grants access
/// to is checked by the route with [`VoterAuth::ensure_voter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterAuth {
    permission: String,
    issued_at: i64,
}

impl VoterAuth {
    /// Parse and verify a khmac header value.
    pub fn verify(header: &str, secret: &[u8], session_expire: u64) -> Result<Self, Error> {
        let malformed = || Error::Unauthorized("malformed khmac token".to_string());

        let (digest, message) = header
            .strip_prefix(KHMAC_PREFIX)
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(malformed)?;
        let digest = HEXLOWER_PERMISSIVE
            .decode(digest.as_bytes())
            .map_err(|_| malformed())?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Internal(format!("Bad shared secret: {e}")))?;
        mac.update(message.as_bytes());
        mac.verify_slice(&digest)
            .map_err(|_| Error::Unauthorized("invalid token signature".to_string()))?;

        let (permission, issued_at) = message.rsplit_once(':').ok_or_else(malformed)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| malformed())?;
        let age = Utc::now().timestamp().saturating_sub(issued_at);
        if age > i64::try_from(session_expire).unwrap_or(i64::MAX) {
            return Err(Error::Unauthorized("token expired".to_string()));
        }

        Ok(Self {
            permission: permission.to_string(),
            issued_at,
        })
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Check that this token belongs to the given voter in the given election.
    pub fn ensure_voter(&self, election_id: &str, voter_id: &str) -> Result<(), Error> {
        if self.permission != voter_permission(election_id, voter_id) {
            return Err(Error::Unauthorized(format!(
                "token does not grant access to voter {voter_id} in election {election_id}"
            )));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterAuth {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            Outcome::Success(config) => config,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Internal("Config is not managed".to_string()),
                ))
            }
        };

        let Some(header) = req.headers().get_one("Authorization") else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("missing Authorization header".to_string()),
            ));
        };

        match Self::verify(header, config.shared_secret(), config.session_expire()) {
            Ok(auth) => Outcome::Success(auth),
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}

/// Where a request came from: the first `X-Forwarded-For` entry if present,
/// else the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAddress(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SourceAddress {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let forwarded = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());
        let address = match forwarded {
            Some(first) => first.to_string(),
            None => req
                .remote()
                .map(|peer| peer.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        };
        Outcome::Success(SourceAddress(address))
    }
}
