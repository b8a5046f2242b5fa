//! REST client for the devlog backend.
//!
//! Every request goes through the `Gateway`, which attaches the bearer
//! token and, on a 401, renews the session once through the
//! `RefreshCoordinator` before retrying. `ApiClient` layers typed
//! endpoint methods on top.

pub mod client;
pub mod error;
pub mod gateway;
pub mod refresh;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::{Attempt, Gateway, Payload};
pub use refresh::RefreshCoordinator;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
