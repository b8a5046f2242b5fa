//! Session and credential handling.
//!
//! This module provides:
//! - `TokenStore`: the access token in memory and the refresh token in a
//!   pluggable `RefreshStore` (file, OS keyring or memory)
//! - `SessionManager`: restore, login, register and logout, publishing
//!   `SessionState` changes on a watch channel
//!
//! Only the refresh token survives a restart.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod token_store;

pub use credentials::KeyringRefreshStore;
pub use session::{SessionManager, SessionState};
pub use storage::{FileRefreshStore, MemoryRefreshStore, RefreshStore, REFRESH_KEY};
pub use token_store::TokenStore;
