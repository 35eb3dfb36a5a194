//! # Error Handling Module
//!
//! Two families of errors live here:
//!
//! - [`AuthError`] is produced per request by the credential verifiers. Its
//!   [`AuthErrorKind`] is what the gate inspects when it decides between
//!   forwarding, a 401, or a 400. The attached message is for logs only.
//! - [`GateError`] covers everything outside request verification: loading
//!   configuration, binding the listener, serving.
//!
//! Clients never see error text. A rejected request gets a bare status line.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use thiserror::Error;

/// Result type for configuration and server operations
pub type GateResult<T> = Result<T, GateError>;

/// Result type returned by the credential verifiers
pub type AuthResult<T> = Result<T, AuthError>;

/// Classification of a credential verification failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// No session cookie, or no `Basic` authorization header
    MissingCredential,
    /// Transport encoding or structural parse failure
    MalformedToken,
    /// Session token signature does not match the signing key
    InvalidSignature,
    /// The credential store rejected the username/password pair
    InvalidCredential,
}

impl AuthErrorKind {
    /// Stable label used in structured log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidCredential => "invalid_credential",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verification failure: what kind it was, plus a diagnostic for the logs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AuthError {
    kind: AuthErrorKind,
    message: &'static str,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    pub fn missing(message: &'static str) -> Self {
        Self::new(AuthErrorKind::MissingCredential, message)
    }

    pub fn malformed(message: &'static str) -> Self {
        Self::new(AuthErrorKind::MalformedToken, message)
    }

    pub fn invalid_signature() -> Self {
        Self::new(AuthErrorKind::InvalidSignature, "session signature mismatch")
    }

    pub fn invalid_credential() -> Self {
        Self::new(AuthErrorKind::InvalidCredential, "invalid username or password")
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}

/// Terminal outcome of a request the gate refused to forward
///
/// Only the cookie verifier's failure kind selects the status. A request
/// that carried no session cookie at all is `Unauthorized`; one that carried
/// a cookie the gate could not accept is `BadRequest`, whatever the Basic
/// fallback reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    Unauthorized,
    BadRequest,
}

impl AuthRejection {
    /// Map the cookie verifier's failure kind to the rejection
    pub fn from_cookie_failure(kind: AuthErrorKind) -> Self {
        match kind {
            AuthErrorKind::MissingCredential => Self::Unauthorized,
            _ => Self::BadRequest,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

/// Status line only: no body, no `WWW-Authenticate`
impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

/// Errors raised while configuring or running the gate
#[derive(Debug, Error)]
pub enum GateError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Listener or serving failure
    #[error("Server error: {message}")]
    Server { message: String },

    /// I/O errors (file operations, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors for configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing errors for configuration files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GateError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a server error with a custom message
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}
