use std::sync::Arc;

use reqwest::Method;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::TokenStore;
use crate::api::{ApiError, Gateway};
use crate::models::{LoginRequest, RefreshRequest, RegisterRequest, TokenResponse, User};

/// Externally observable session state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Startup, before the stored refresh token has been tried.
    #[default]
    Unknown,
    Anonymous,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Short label for status lines and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unknown => "checking",
            SessionState::Anonymous => "signed out",
            SessionState::Authenticated(_) => "signed in",
        }
    }
}

/// Drives the session lifecycle: restore on startup, login, register,
/// logout and profile lookups. Shares its token store and state channel
/// with the [`Gateway`] it sends through.
#[derive(Clone)]
pub struct SessionManager {
    gateway: Gateway,
}

impl SessionManager {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    fn tokens(&self) -> &Arc<TokenStore> {
        self.gateway.tokens()
    }

    fn publish(&self, state: SessionState) {
        debug!(state = state.label(), "Session state changed");
        self.gateway.state().send_replace(state);
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.gateway.state().borrow().clone()
    }

    /// Watch state transitions, including those caused by failed refreshes
    /// during ordinary API calls.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.gateway.state().subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.user().map(|u| u.is_admin).unwrap_or(false)
    }

    /// Leave `Unknown` on startup by trying the stored refresh token.
    pub async fn restore(&self) -> SessionState {
        if !self.tokens().has_refresh() {
            debug!("No stored session");
            self.publish(SessionState::Anonymous);
            return SessionState::Anonymous;
        }
        match self.refresh().await {
            Ok(user) => SessionState::Authenticated(user),
            Err(_) => SessionState::Anonymous,
        }
    }

    /// Exchange the refresh token now. On failure both tokens are dropped
    /// and the session becomes anonymous.
    pub async fn refresh(&self) -> Result<User, ApiError> {
        match self.gateway.refresher().renew().await {
            Some(user) => Ok(user),
            None => {
                warn!("Could not renew session");
                self.tokens().clear();
                self.publish(SessionState::Anonymous);
                Err(ApiError::RefreshFailed)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let body = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let pair: TokenResponse = self.gateway.post("/auth/login", &body).await?;
        Ok(self.establish(pair))
    }

    pub async fn register(
        &self,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let body = RegisterRequest {
            display_name: display_name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let pair: TokenResponse = self.gateway.post("/auth/register", &body).await?;
        Ok(self.establish(pair))
    }

    /// End the session locally. The server is told to revoke the refresh
    /// token, but its answer does not matter.
    pub async fn logout(&self) {
        if self.tokens().has_refresh() {
            // Read at send time: an expired access token rotates the pair first
            let tokens = self.tokens().clone();
            let body = move || {
                tokens.get_refresh().and_then(|refresh_token| {
                    serde_json::to_value(RefreshRequest { refresh_token }).ok()
                })
            };
            if let Err(e) = self
                .gateway
                .execute_with("/auth/logout", Method::POST, body)
                .await
            {
                warn!(error = %e, "Server-side logout failed");
            }
        }
        self.tokens().clear();
        self.publish(SessionState::Anonymous);
        info!("Logged out");
    }

    /// Fetch the current user's profile.
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.gateway.get("/auth/me", Vec::new()).await?;
        self.publish(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    fn establish(&self, pair: TokenResponse) -> User {
        self.tokens().store_pair(&pair.access_token, &pair.refresh_token);
        info!(user_id = %pair.user.id, admin = pair.user.is_admin, "Signed in");
        self.publish(SessionState::Authenticated(pair.user.clone()));
        pair.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::{json, token_body, ScriptedTransport};
    use crate::api::transport::{ApiRequest, ApiResponse};
    use crate::auth::MemoryRefreshStore;
    use reqwest::StatusCode;
    use serde_json::json as value;

    fn manager(
        transport: &ScriptedTransport,
        refresh: Option<&str>,
    ) -> (SessionManager, Arc<TokenStore>) {
        let store = match refresh {
            Some(token) => MemoryRefreshStore::with_token(token),
            None => MemoryRefreshStore::new(),
        };
        let tokens = Arc::new(TokenStore::new(Arc::new(store)));
        let (tx, _rx) = watch::channel(SessionState::Unknown);
        let gateway = Gateway::new(Arc::new(transport.clone()), tokens.clone(), Arc::new(tx));
        (SessionManager::new(gateway), tokens)
    }

    fn backend(req: &ApiRequest) -> Result<ApiResponse, ApiError> {
        match req.path.as_str() {
            "/auth/login" => {
                let body = req.body.as_ref().unwrap();
                if body["password"] == "correct horse" {
                    json(StatusCode::OK, token_body("a-login", "r-login"))
                } else {
                    json(
                        StatusCode::UNAUTHORIZED,
                        value!({ "code": "INVALID_CREDENTIALS", "message": "Invalid email or password" }),
                    )
                }
            }
            "/auth/register" => json(StatusCode::CREATED, token_body("a-reg", "r-reg")),
            "/auth/refresh" => {
                if req.body.as_ref().unwrap()["refreshToken"] == "r-valid" {
                    json(StatusCode::OK, token_body("a-ref", "r-rotated"))
                } else {
                    json(StatusCode::UNAUTHORIZED, value!({ "code": "INVALID_TOKEN", "message": "Invalid refresh token" }))
                }
            }
            "/auth/logout" => Ok(ApiResponse::new(StatusCode::NO_CONTENT, "")),
            other => panic!("unexpected request to {}", other),
        }
    }

    #[tokio::test]
    async fn test_restore_without_token_is_anonymous() {
        let transport = ScriptedTransport::new(backend);
        let (session, _tokens) = manager(&transport, None);
        assert_eq!(session.state(), SessionState::Unknown);

        assert_eq!(session.restore().await, SessionState::Anonymous);
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let transport = ScriptedTransport::new(backend);
        let (session, tokens) = manager(&transport, Some("r-valid"));

        let state = session.restore().await;
        assert!(state.is_authenticated());
        assert_eq!(session.user().unwrap().email, "ada@example.com");
        assert!(session.is_admin());
        assert_eq!(tokens.get_access().as_deref(), Some("a-ref"));
        assert_eq!(tokens.get_refresh().as_deref(), Some("r-rotated"));
    }

    #[tokio::test]
    async fn test_restore_with_revoked_token_clears_it() {
        let transport = ScriptedTransport::new(backend);
        let (session, tokens) = manager(&transport, Some("r-revoked"));

        assert_eq!(session.restore().await, SessionState::Anonymous);
        assert_eq!(tokens.get_refresh(), None);
        assert_eq!(session.refresh().await.unwrap_err(), ApiError::RefreshFailed);
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let transport = ScriptedTransport::new(backend);
        let (session, tokens) = manager(&transport, None);
        let mut changes = session.subscribe();

        let user = session.login(" ada@example.com ", "correct horse").await.unwrap();
        assert_eq!(user.display_name, "Ada");
        assert!(changes.has_changed().unwrap());
        assert!(changes.borrow_and_update().is_authenticated());
        assert_eq!(tokens.get_access().as_deref(), Some("a-login"));
        assert_eq!(transport.sent()[0].body.as_ref().unwrap()["email"], "ada@example.com");

        session.logout().await;
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(tokens.get_access(), None);
        assert_eq!(tokens.get_refresh(), None);
        let logout = transport.sent().pop().unwrap();
        assert_eq!(logout.path, "/auth/logout");
        assert_eq!(logout.body.unwrap()["refreshToken"], "r-login");
    }

    #[tokio::test]
    async fn test_bad_password_surfaces_server_message() {
        let transport = ScriptedTransport::new(backend);
        let (session, _tokens) = manager(&transport, None);

        let err = session.login("ada@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let transport = ScriptedTransport::new(backend);
        let (session, tokens) = manager(&transport, None);

        session.register("Ada", "ada@example.com", "correct horse").await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(tokens.get_refresh().as_deref(), Some("r-reg"));
        assert_eq!(transport.sent()[0].body.as_ref().unwrap()["displayName"], "Ada");
    }

    #[tokio::test]
    async fn test_logout_survives_server_failure() {
        let transport = ScriptedTransport::new(|_| Err(ApiError::Network("offline".to_string())));
        let (session, tokens) = manager(&transport, Some("r-1"));
        tokens.set_access(Some("a-1".to_string()));

        session.logout().await;
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(tokens.get_refresh(), None);
    }

    #[tokio::test]
    async fn test_logout_with_expired_access_revokes_rotated_token() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            "/auth/refresh" => json(StatusCode::OK, token_body("a-new", "r-new")),
            "/auth/logout" if req.bearer.as_deref() == Some("a-new") => {
                Ok(ApiResponse::new(StatusCode::NO_CONTENT, ""))
            }
            _ => json(
                StatusCode::UNAUTHORIZED,
                value!({ "code": "TOKEN_EXPIRED", "message": "Access token expired" }),
            ),
        });
        let (session, tokens) = manager(&transport, Some("r-old"));
        tokens.set_access(Some("a-old".to_string()));

        session.logout().await;

        assert_eq!(transport.count("/auth/logout"), 2);
        let last = transport.sent().pop().unwrap();
        assert_eq!(last.path, "/auth/logout");
        assert_eq!(last.bearer.as_deref(), Some("a-new"));
        assert_eq!(last.body.unwrap()["refreshToken"], "r-new");
        assert_eq!(tokens.get_refresh(), None);
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_without_token_skips_server() {
        let transport = ScriptedTransport::new(backend);
        let (session, _tokens) = manager(&transport, None);

        session.logout().await;
        assert!(transport.sent().is_empty());
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_me_updates_profile() {
        let transport = ScriptedTransport::new(|_| {
            json(
                StatusCode::OK,
                value!({ "id": "u-9", "email": "grace@example.com", "displayName": "Grace", "createdAt": "2024-01-01T00:00:00Z" }),
            )
        });
        let (session, tokens) = manager(&transport, None);
        tokens.set_access(Some("a-1".to_string()));

        let user = session.me().await.unwrap();
        assert_eq!(user.id, "u-9");
        assert_eq!(session.user().unwrap().display_name, "Grace");
        assert!(!session.is_admin());
    }
}
