//! devlog core - client-side session management and REST client for a
//! devlog blog/portfolio backend.
//!
//! The pieces fit together like this:
//!
//! - [`auth::TokenStore`] keeps the access token in memory and the refresh
//!   token in a [`auth::RefreshStore`]
//! - [`api::Gateway`] sends every request, attaching the bearer token and
//!   renewing the session once on a 401
//! - [`auth::SessionManager`] handles restore, login, register and logout
//! - [`api::ApiClient`] exposes the typed endpoints
//!
//! [`DevlogClient`] wires them up around one shared token store.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::debug;

use api::{ApiClient, Gateway, HttpTransport, Transport};
use auth::{RefreshStore, SessionManager, SessionState, TokenStore};
use config::Config;

/// Session manager and API client sharing one token store and one
/// session-state channel.
#[derive(Clone)]
pub struct DevlogClient {
    pub session: SessionManager,
    pub api: ApiClient,
}

impl DevlogClient {
    /// Build an HTTP client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.api_url();
        debug!(base_url = %base_url, storage = ?config.token_storage, "Creating client");
        let transport = HttpTransport::new(base_url, config.request_timeout())?;
        Ok(Self::with_parts(Arc::new(transport), config.refresh_store()?))
    }

    /// Assemble a client from an arbitrary transport and refresh-token store.
    /// The session starts in [`SessionState::Unknown`].
    pub fn with_parts(transport: Arc<dyn Transport>, refresh: Arc<dyn RefreshStore>) -> Self {
        let tokens = Arc::new(TokenStore::new(refresh));
        let (state, _) = watch::channel(SessionState::Unknown);
        let gateway = Gateway::new(transport, tokens, Arc::new(state));
        Self {
            session: SessionManager::new(gateway.clone()),
            api: ApiClient::new(gateway),
        }
    }
}
