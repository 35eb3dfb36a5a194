pub mod basic;
pub mod cookie;
pub mod middleware;
pub mod store;


pub use basic::{BasicCredentials, BasicVerifier};
pub use cookie::{CookieVerifier, SessionSigner};
pub use middleware::{
    auth_middleware, AuthGate, AuthLayer, AuthScheme, AuthService, AuthenticatedUser, GateDecision,
};
pub use store::{CredentialStore, InMemoryCredentialStore};
