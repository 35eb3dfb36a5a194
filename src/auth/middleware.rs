//! # Authentication Middleware
//!
//! [`AuthGate`] runs the session cookie check first and falls back to HTTP
//! Basic when it fails. The first success wins. When both fail, the status
//! is chosen from the cookie failure alone: no cookie at all is a 401,
//! anything else the cookie verifier rejected is a 400. The Basic failure
//! only decides pass/fail.
//!
//! Successful requests carry an [`AuthenticatedUser`] in their extensions
//! for downstream handlers. Rejected requests get a bare status line.
//!
//! The gate is usable as a tower [`Layer`] or through
//! `axum::middleware::from_fn_with_state` with [`auth_middleware`].

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::auth::basic::BasicVerifier;
use crate::auth::cookie::CookieVerifier;
use crate::auth::store::CredentialStore;
use crate::core::config::AuthSettings;
use crate::core::error::AuthRejection;

/// Which credential scheme proved the identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    SessionCookie,
    Basic,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCookie => "session_cookie",
            Self::Basic => "basic",
        }
    }
}

/// Verified identity attached to a forwarded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub scheme: AuthScheme,
}

/// Handlers behind the gate take this as an argument to read the caller
///
/// Extraction fails with 401 when no identity was attached, which happens
/// when the gate is configured with `no_auth` or the route is not gated.
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)
    }
}

/// What the gate decided for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// `no_auth` is set; forward without an identity
    Bypass,
    /// Forward with the verified identity
    Authenticated(AuthenticatedUser),
    /// Terminate with a status line
    Rejected(AuthRejection),
}

/// Cookie-then-Basic authentication gate
#[derive(Clone)]
pub struct AuthGate {
    cookie: CookieVerifier,
    basic: BasicVerifier,
    no_auth: bool,
}

impl AuthGate {
    pub fn new(cookie: CookieVerifier, basic: BasicVerifier) -> Self {
        Self {
            cookie,
            basic,
            no_auth: false,
        }
    }

    /// Build a gate from configuration and a credential store
    pub fn from_settings(settings: &AuthSettings, store: Arc<dyn CredentialStore>) -> Self {
        let cookie = CookieVerifier::new(settings.signing_key.clone())
            .with_cookie_name(settings.session_cookie.clone());
        Self::new(cookie, BasicVerifier::new(store)).with_no_auth(settings.no_auth)
    }

    /// Skip every check and forward unconditionally
    pub fn with_no_auth(mut self, no_auth: bool) -> Self {
        self.no_auth = no_auth;
        self
    }

    pub fn no_auth(&self) -> bool {
        self.no_auth
    }

    /// Decide whether the request may proceed
    pub async fn authenticate(&self, headers: &HeaderMap) -> GateDecision {
        if self.no_auth {
            return GateDecision::Bypass;
        }

        let cookie_err = match self.cookie.verify(headers) {
            Ok(username) => {
                debug!(username = %username, scheme = "session_cookie", "request authenticated");
                return GateDecision::Authenticated(AuthenticatedUser {
                    username,
                    scheme: AuthScheme::SessionCookie,
                });
            }
            Err(err) => err,
        };

        match self.basic.verify(headers).await {
            Ok(username) => {
                debug!(username = %username, scheme = "basic", "request authenticated");
                GateDecision::Authenticated(AuthenticatedUser {
                    username,
                    scheme: AuthScheme::Basic,
                })
            }
            Err(basic_err) => {
                let rejection = AuthRejection::from_cookie_failure(cookie_err.kind());
                warn!(
                    cookie_failure = %cookie_err.kind(),
                    basic_failure = %basic_err.kind(),
                    status = rejection.status_code().as_u16(),
                    "authentication failed: {}",
                    cookie_err.message()
                );
                GateDecision::Rejected(rejection)
            }
        }
    }

    /// Authenticate, then forward or reject
    ///
    /// `forward` runs only when the request is allowed through.
    pub async fn handle<F, Fut>(&self, mut request: Request, forward: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let headers = request.headers();
        let decision = self.authenticate(headers).await;
        match decision {
            GateDecision::Bypass => forward(request).await,
            GateDecision::Authenticated(user) => {
                request.extensions_mut().insert(user);
                forward(request).await
            }
            GateDecision::Rejected(rejection) => rejection.into_response(),
        }
    }
}

/// Axum middleware function for authentication
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    request: Request,
    next: Next,
) -> Response {
    gate.handle(request, |request| next.run(request)).await
}

/// Tower layer for authentication middleware
#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<AuthGate>,
}

impl AuthLayer {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Tower service for authentication
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: Arc<AuthGate>,
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let gate = self.gate.clone();
        // The clone is not ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let headers = request.headers();
            let decision = gate.authenticate(headers).await;
            match decision {
                GateDecision::Bypass => inner.call(request).await,
                GateDecision::Authenticated(user) => {
                    request.extensions_mut().insert(user);
                    inner.call(request).await
                }
                GateDecision::Rejected(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
