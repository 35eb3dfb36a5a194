//! # HTTP Basic Verification
//!
//! Parses `Authorization: Basic <base64(username:password)>` and asks the
//! credential store whether the pair is valid. The split is on the first
//! `:` only, so passwords may contain colons.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use tracing::debug;

use crate::auth::store::CredentialStore;
use crate::core::error::{AuthError, AuthResult};

const BASIC_PREFIX: &str = "Basic ";

/// Decoded `username:password` pair
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse the value of an `Authorization` header
    pub fn parse(header_value: &str) -> AuthResult<Self> {
        Self::parse_bytes(header_value.as_bytes())
    }

    fn parse_bytes(header_value: &[u8]) -> AuthResult<Self> {
        let encoded = header_value
            .strip_prefix(BASIC_PREFIX.as_bytes())
            .ok_or_else(|| AuthError::missing("no basic auth available"))?;

        let decoded = BASE64.decode(encoded).map_err(|e| {
            debug!(error = %e, "basic-auth: invalid encoding");
            AuthError::malformed("basic credentials are not valid base64")
        })?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::malformed("basic credentials are not valid UTF-8"))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::malformed("malformed credentials; expected $user:$pass"))?;

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Pull credentials out of request headers
    pub fn from_headers(headers: &HeaderMap) -> AuthResult<Self> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AuthError::missing("no basic auth available"))?;
        Self::parse_bytes(value.as_bytes())
    }
}

/// Checks HTTP Basic credentials against a [`CredentialStore`]
#[derive(Clone)]
pub struct BasicVerifier {
    store: Arc<dyn CredentialStore>,
}

impl BasicVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Return the username when the store accepts the presented password
    pub async fn verify(&self, headers: &HeaderMap) -> AuthResult<String> {
        let credentials = BasicCredentials::from_headers(headers)?;

        if !self
            .store
            .check_password(&credentials.username, &credentials.password)
            .await
        {
            return Err(AuthError::invalid_credential());
        }

        Ok(credentials.username)
    }
}
