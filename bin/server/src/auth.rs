use crate::constants::USER_ID_HEADER;
use crate::handlers::error::handle_auth_error;
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use std::future::{ready, Ready};

/// User authenticated upstream, identified by the `X-User-Id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: u64,
}

impl AuthenticatedUser {
    fn from_header(req: &HttpRequest) -> Result<Self, String> {
        let value = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or_else(|| format!("Missing {} header", USER_ID_HEADER))?;
        let value = value
            .to_str()
            .map_err(|_| format!("Malformed {} header", USER_ID_HEADER))?;
        let id = value
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("Invalid user id: {:?}", value))?;
        Ok(Self { id })
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            Self::from_header(req).map_err(|e| handle_auth_error("Authentication failed", e)),
        )
    }
}
