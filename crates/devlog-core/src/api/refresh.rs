use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::transport::{ApiRequest, Transport};
use crate::auth::{SessionState, TokenStore};
use crate::models::{RefreshRequest, TokenResponse, User};

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

type Flight = Shared<BoxFuture<'static, Option<User>>>;

/// Exchanges the stored refresh token for a new token pair.
///
/// Concurrent callers share one in-flight exchange, so a burst of 401s
/// rotates the refresh token exactly once.
#[derive(Clone)]
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    state: Arc<watch::Sender<SessionState>>,
    in_flight: Arc<Mutex<Option<Flight>>>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        Self {
            transport,
            tokens,
            state,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Renew the session. `true` when a new access token is in place.
    pub async fn refresh(&self) -> bool {
        self.renew().await.is_some()
    }

    /// Like [`refresh`](Self::refresh), but hands back the profile that came
    /// with the new tokens.
    pub async fn renew(&self) -> Option<User> {
        let flight = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let flight = Self::exchange(
                        self.transport.clone(),
                        self.tokens.clone(),
                        self.state.clone(),
                        self.in_flight.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Refresh on behalf of a request that was rejected while carrying
    /// `stale`. If the access token has changed since, another caller has
    /// already renewed the session and no exchange is needed.
    pub async fn refresh_after(&self, stale: Option<&str>) -> bool {
        if let Some(current) = self.tokens.get_access() {
            if Some(current.as_str()) != stale {
                debug!("Access token already rotated, skipping refresh");
                return true;
            }
        }
        self.refresh().await
    }

    async fn exchange(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        state: Arc<watch::Sender<SessionState>>,
        in_flight: Arc<Mutex<Option<Flight>>>,
    ) -> Option<User> {
        let outcome = Self::rotate(transport.as_ref(), &tokens).await;

        // Later callers must start a fresh exchange
        in_flight.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Some(ref user) = outcome {
            state.send_replace(SessionState::Authenticated(user.clone()));
        }
        outcome
    }

    async fn rotate(transport: &dyn Transport, tokens: &TokenStore) -> Option<User> {
        let Some(refresh_token) = tokens.get_refresh() else {
            debug!("No refresh token stored");
            return None;
        };

        let body = match serde_json::to_value(RefreshRequest { refresh_token }) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to encode refresh request");
                return None;
            }
        };

        // Sent straight to the transport: a 401 here must not recurse
        let request = ApiRequest::new(Method::POST, REFRESH_PATH).with_body(body);
        let response = match transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status.is_success() {
            warn!(status = %response.status, "Refresh token rejected");
            return None;
        }

        match serde_json::from_str::<TokenResponse>(&response.body) {
            Ok(pair) => {
                tokens.store_pair(&pair.access_token, &pair.refresh_token);
                info!(user_id = %pair.user.id, "Session renewed");
                Some(pair.user)
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse refresh response");
                None
            }
        }
    }
}
