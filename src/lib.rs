//! # Session Gate
//!
//! Authentication gate for HTTP APIs built on axum and tower. Each request
//! must present either a signed `sessionid` cookie or HTTP Basic
//! credentials; everything else is turned away with a bare 401 or 400.

/// Error types, configuration, and the signing key
pub mod core;

/// Credential verifiers, the credential store seam, and the gate middleware
pub mod auth;

/// Axum application wiring and the HTTP server
pub mod gateway;

/// Tracing subscriber setup
pub mod observability;

pub use auth::{
    AuthGate, AuthLayer, AuthenticatedUser, BasicVerifier, CookieVerifier, CredentialStore,
    GateDecision, InMemoryCredentialStore, SessionSigner,
};
pub use core::config::{GateConfig, SigningKey};
pub use core::error::{AuthError, AuthErrorKind, AuthRejection, GateError, GateResult};
pub use gateway::server::GateServer;
