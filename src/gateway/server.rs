//! # HTTP Server Module
//!
//! Wires the gate in front of the protected API routes and serves them with
//! axum. `/health` stays outside the gate.
//!
//! Protected routes:
//! - `POST /api/2/auth/:username/login.json` issues a session cookie
//! - `POST /api/2/auth/:username/logout.json` clears it
//! - `GET /api/2/me` reports the authenticated username

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::auth::{
    AuthGate, AuthLayer, AuthenticatedUser, InMemoryCredentialStore, SessionSigner,
};
use crate::core::config::GateConfig;
use crate::core::error::{GateError, GateResult};

/// State shared by the session endpoints
#[derive(Clone)]
pub struct AppState {
    signer: SessionSigner,
    cookie_name: Arc<str>,
}

impl AppState {
    pub fn new(signer: SessionSigner, cookie_name: impl Into<Arc<str>>) -> Self {
        Self {
            signer,
            cookie_name: cookie_name.into(),
        }
    }
}

/// Build the axum application around an existing gate
pub fn build_app(gate: Arc<AuthGate>, state: AppState, request_timeout: Duration) -> AxumRouter {
    let protected = AxumRouter::new()
        .route("/api/2/auth/:username/login.json", post(login))
        .route("/api/2/auth/:username/logout.json", post(logout))
        .route("/api/2/me", get(me))
        .route_layer(AuthLayer::new(gate))
        .with_state(state);

    AxumRouter::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn set_cookie(value: String) -> Result<HeaderValue, StatusCode> {
    HeaderValue::from_str(&value).map_err(|e| {
        error!(error = %e, "failed to build Set-Cookie header");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Issue a session cookie for the caller
///
/// With `no_auth` there is no verified identity, so nothing is issued.
async fn login(
    State(state): State<AppState>,
    Path(username): Path<String>,
    user: Option<AuthenticatedUser>,
) -> Result<Response, StatusCode> {
    let Some(user) = user else {
        return Ok(StatusCode::OK.into_response());
    };

    if user.username != username {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = state.signer.issue(&user.username).map_err(|e| {
        error!(error = %e, "failed to sign session token");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let cookie = set_cookie(format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        state.cookie_name, token
    ))?;

    info!(username = %user.username, scheme = user.scheme.as_str(), "session issued");
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::OK).into_response())
}

async fn logout(
    State(state): State<AppState>,
    Path(username): Path<String>,
    user: Option<AuthenticatedUser>,
) -> Result<Response, StatusCode> {
    if let Some(user) = &user {
        if user.username != username {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let cookie = set_cookie(format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.cookie_name
    ))?;
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::OK).into_response())
}

async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    Json(json!({
        "username": user.username,
        "scheme": user.scheme.as_str(),
    }))
}

/// The gate's HTTP server
pub struct GateServer {
    app: AxumRouter,
    bind_addr: SocketAddr,
}

impl GateServer {
    /// Build the server from configuration, seeding the in-memory store
    pub fn new(config: &GateConfig) -> GateResult<Self> {
        let address = format!("{}:{}", config.server.bind_address, config.server.http_port);
        let bind_addr: SocketAddr = address
            .parse()
            .map_err(|e| GateError::config(format!("Invalid bind address: {}", e)))?;

        let store = Arc::new(InMemoryCredentialStore::from_entries(&config.auth.users)?);
        info!(users = store.len(), "credential store loaded");

        let gate = Arc::new(AuthGate::from_settings(&config.auth, store));
        if gate.no_auth() {
            info!("authentication disabled by configuration; all requests are forwarded");
        }

        let state = AppState::new(
            SessionSigner::new(config.auth.signing_key.clone()),
            config.auth.session_cookie.as_str(),
        );
        let app = build_app(gate, state, config.server.request_timeout);

        Ok(Self { app, bind_addr })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> GateResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            GateError::server(format!("Failed to bind server to {}: {}", self.bind_addr, e))
        })?;

        info!("HTTP server listening on {}", self.bind_addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GateError::server(format!("Server error: {}", e)))
    }
}
