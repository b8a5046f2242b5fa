use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::refresh::RefreshCoordinator;
use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;
use crate::auth::{SessionState, TokenStore};

/// Which send of a logical call this is. Only a `First` attempt may spend
/// the refresh; a `Retry` is terminal whatever its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

impl Attempt {
    fn may_refresh(self) -> bool {
        matches!(self, Attempt::First)
    }
}

/// Successful response body. Empty for `204 No Content`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    body: String,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Sends requests on behalf of the session: attaches the bearer token and
/// recovers from one expired access token per call.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    refresher: RefreshCoordinator,
    state: Arc<watch::Sender<SessionState>>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        let refresher = RefreshCoordinator::new(transport.clone(), tokens.clone(), state.clone());
        Self {
            transport,
            tokens,
            refresher,
            state,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub(crate) fn state(&self) -> &Arc<watch::Sender<SessionState>> {
        &self.state
    }

    /// Send `method endpoint` with an optional JSON body.
    pub async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Payload, ApiError> {
        let mut request = ApiRequest::new(method, endpoint);
        request.body = body;
        self.send(request).await
    }

    /// Like [`execute`](Self::execute), but the body is rebuilt for every
    /// attempt, so a retry after a refresh sees the rotated tokens.
    pub async fn execute_with<F>(
        &self,
        endpoint: &str,
        method: Method,
        body: F,
    ) -> Result<Payload, ApiError>
    where
        F: Fn() -> Option<Value>,
    {
        self.dispatch(|| {
            let mut request = ApiRequest::new(method.clone(), endpoint);
            request.body = body();
            request
        })
        .await
    }

    /// Send a prepared request. The bearer field is filled in here.
    pub async fn send(&self, request: ApiRequest) -> Result<Payload, ApiError> {
        self.dispatch(|| request.clone()).await
    }

    async fn dispatch<F>(&self, build: F) -> Result<Payload, ApiError>
    where
        F: Fn() -> ApiRequest,
    {
        let mut attempt = Attempt::First;
        loop {
            let bearer = self.tokens.get_access();
            let outbound = ApiRequest {
                bearer: bearer.clone(),
                ..build()
            };
            let path = outbound.path.clone();
            let response = self.transport.send(outbound).await?;

            if response.status == StatusCode::UNAUTHORIZED && attempt.may_refresh() {
                if self.refresher.refresh_after(bearer.as_deref()).await {
                    debug!(path = %path, "Retrying after token refresh");
                    attempt = Attempt::Retry;
                    continue;
                }
                warn!(path = %path, "Token refresh failed, clearing session");
                self.tokens.clear();
                self.state.send_replace(SessionState::Anonymous);
            }

            return Self::into_payload(response);
        }
    }

    fn into_payload(response: ApiResponse) -> Result<Payload, ApiError> {
        if !response.status.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        if response.status == StatusCode::NO_CONTENT {
            return Ok(Payload::empty());
        }
        Ok(Payload {
            body: response.body,
        })
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::GET, path).with_query(query);
        self.send(request).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(path, Method::POST, Some(Self::encode(body)?))
            .await?
            .json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(path, Method::PUT, Some(Self::encode(body)?))
            .await?
            .json()
    }

    /// Call an endpoint that answers with no content.
    pub async fn call(&self, path: &str, method: Method) -> Result<(), ApiError> {
        self.execute(path, method, None).await.map(|_| ())
    }
}
