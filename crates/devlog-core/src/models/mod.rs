//! Wire models for the devlog REST API.
//!
//! This module contains the request and response bodies exchanged with
//! the backend:
//!
//! - `User`, `TokenResponse` and the auth request bodies
//! - `Post`, `Comment`: blog content
//! - `Project`: portfolio entries
//! - `Page`, `Tag` and the image-AI helper types

pub mod comment;
pub mod content;
pub mod post;
pub mod project;
pub mod user;

pub use comment::{Comment, CommentCreate};
pub(crate) use content::TagListResponse;
pub use content::{GenerateImage, GeneratePrompt, GeneratedImage, GeneratedPrompt, Page, Tag};
pub use post::{Post, PostCreate, PostQuery, PostUpdate};
pub use project::{Project, ProjectCreate, ProjectQuery, ProjectUpdate, StatItem, TechStackItem};
pub use user::{LoginRequest, RefreshRequest, RegisterRequest, TokenResponse, User};
