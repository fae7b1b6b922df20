//! Caller identification.
//!
//! Sessions and logins are handled by the authentication layer in front of this service. By the time a request
//! reaches us it carries the authenticated user's id in the `X-User-Id` header, and that is all the escrow service
//! trusts. The header must never be forwarded from the public internet unchecked.
use std::{
    fmt::Display,
    future::{ready, Ready},
};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use log::*;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// The id of the authenticated user making the request. Handlers that take a `CallerId` reply `401` if the header is
/// missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromRequest for CallerId {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let caller = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| CallerId(s.to_string()));
        if caller.is_none() {
            debug!("💻️ Request to {} has no {USER_ID_HEADER} header", req.path());
        }
        ready(caller.ok_or(ServerError::MissingCallerId))
    }
}
