//! Typed endpoint methods for the devlog REST API.
//!
//! `ApiClient` is a thin layer over the [`Gateway`]: it builds paths and
//! query strings and decodes the JSON bodies. Token handling and the
//! refresh-and-retry cycle live entirely in the gateway.

use reqwest::Method;
use tracing::debug;

use super::{ApiError, Gateway};
use crate::models::{
    Comment, CommentCreate, GenerateImage, GeneratePrompt, GeneratedImage, GeneratedPrompt, Page,
    Post, PostCreate, PostQuery, PostUpdate, Project, ProjectCreate, ProjectQuery, ProjectUpdate,
    Tag, TagListResponse,
};

// ============================================================================
// Endpoints
// ============================================================================

const POSTS_PATH: &str = "/posts";
const COMMENTS_PATH: &str = "/comments";
const TAGS_PATH: &str = "/tags";
const PROJECTS_PATH: &str = "/projects";
const GENERATE_PROMPT_PATH: &str = "/image-ai/generate-prompt";
const GENERATE_IMAGE_PATH: &str = "/image-ai/generate-image";

/// API client for the devlog backend.
/// Clone is cheap - the gateway shares its transport and token store.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Validate an id before splicing it into a path.
    fn segment(id: &str) -> Result<&str, ApiError> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') || id.contains('?') {
            return Err(ApiError::InvalidRequest(format!("Invalid id: {:?}", id)));
        }
        Ok(id)
    }

    // ===== Posts =====

    pub async fn list_posts(&self, query: &PostQuery) -> Result<Page<Post>, ApiError> {
        let page: Page<Post> = self.gateway.get(POSTS_PATH, query.to_pairs()).await?;
        debug!(count = page.items.len(), total = page.total, "Fetched posts");
        Ok(page)
    }

    pub async fn get_post(&self, id: &str) -> Result<Post, ApiError> {
        let path = format!("{}/{}", POSTS_PATH, Self::segment(id)?);
        self.gateway.get(&path, Vec::new()).await
    }

    pub async fn create_post(&self, post: &PostCreate) -> Result<Post, ApiError> {
        self.gateway.post(POSTS_PATH, post).await
    }

    pub async fn update_post(&self, id: &str, update: &PostUpdate) -> Result<Post, ApiError> {
        let path = format!("{}/{}", POSTS_PATH, Self::segment(id)?);
        self.gateway.put(&path, update).await
    }

    pub async fn delete_post(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", POSTS_PATH, Self::segment(id)?);
        self.gateway.call(&path, Method::DELETE).await
    }

    pub async fn like_post(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}/like", POSTS_PATH, Self::segment(id)?);
        self.gateway.call(&path, Method::POST).await
    }

    pub async fn unlike_post(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}/like", POSTS_PATH, Self::segment(id)?);
        self.gateway.call(&path, Method::DELETE).await
    }

    // ===== Comments =====

    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let path = format!("{}/{}/comments", POSTS_PATH, Self::segment(post_id)?);
        self.gateway.get(&path, Vec::new()).await
    }

    pub async fn create_comment(
        &self,
        post_id: &str,
        comment: &CommentCreate,
    ) -> Result<Comment, ApiError> {
        let path = format!("{}/{}/comments", POSTS_PATH, Self::segment(post_id)?);
        self.gateway.post(&path, comment).await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", COMMENTS_PATH, Self::segment(comment_id)?);
        self.gateway.call(&path, Method::DELETE).await
    }

    // ===== Tags =====

    pub async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let resp: TagListResponse = self.gateway.get(TAGS_PATH, Vec::new()).await?;
        Ok(resp.tags)
    }

    // ===== Projects =====

    pub async fn list_projects(&self, query: &ProjectQuery) -> Result<Page<Project>, ApiError> {
        self.gateway.get(PROJECTS_PATH, query.to_pairs()).await
    }

    pub async fn get_project(&self, slug: &str) -> Result<Project, ApiError> {
        let path = format!("{}/{}", PROJECTS_PATH, Self::segment(slug)?);
        self.gateway.get(&path, Vec::new()).await
    }

    pub async fn create_project(&self, project: &ProjectCreate) -> Result<Project, ApiError> {
        self.gateway.post(PROJECTS_PATH, project).await
    }

    pub async fn update_project(
        &self,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        let path = format!("{}/{}", PROJECTS_PATH, Self::segment(id)?);
        self.gateway.put(&path, update).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", PROJECTS_PATH, Self::segment(id)?);
        self.gateway.call(&path, Method::DELETE).await
    }

    // ===== Image AI =====

    /// Ask the backend to write an image prompt for a draft post.
    pub async fn generate_prompt(&self, draft: &GeneratePrompt) -> Result<String, ApiError> {
        let resp: GeneratedPrompt = self.gateway.post(GENERATE_PROMPT_PATH, draft).await?;
        Ok(resp.prompt)
    }

    /// Render `prompt` into an image. Returns base64-encoded PNG data.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ApiError> {
        let body = GenerateImage {
            prompt: prompt.to_string(),
        };
        let resp: GeneratedImage = self.gateway.post(GENERATE_IMAGE_PATH, &body).await?;
        Ok(resp.image_data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::StatusCode;
    use serde_json::json as value;
    use tokio::sync::watch;

    use super::*;
    use crate::api::transport::testing::{json, ScriptedTransport};
    use crate::api::transport::ApiResponse;
    use crate::auth::{MemoryRefreshStore, SessionState, TokenStore};

    fn client(transport: &ScriptedTransport) -> ApiClient {
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryRefreshStore::new())));
        tokens.set_access(Some("a-1".to_string()));
        let (tx, _rx) = watch::channel(SessionState::Unknown);
        ApiClient::new(Gateway::new(
            Arc::new(transport.clone()),
            tokens,
            Arc::new(tx),
        ))
    }

    fn post_json(id: &str) -> serde_json::Value {
        value!({
            "id": id, "title": "Hello", "image": "", "body": "text", "tags": ["rust"],
            "uid": "u-1", "createdBy": "Ada", "createdAt": "2024-05-01T08:30:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_posts_sends_filters() {
        let transport = ScriptedTransport::new(|_| {
            json(
                StatusCode::OK,
                value!({ "items": [post_json("p1")], "total": 1, "page": 1, "size": 10, "pages": 1 }),
            )
        });
        let api = client(&transport);

        let page = api.list_posts(&PostQuery::search("rust")).await.unwrap();
        assert_eq!(page.items[0].id, "p1");
        assert!(!page.has_next());

        let sent = &transport.sent()[0];
        assert_eq!(sent.method, Method::GET);
        assert_eq!(sent.path, "/posts");
        assert_eq!(sent.query, vec![("q".to_string(), "rust".to_string())]);
    }

    #[tokio::test]
    async fn test_like_and_unlike_use_same_path() {
        let transport = ScriptedTransport::new(|_| Ok(ApiResponse::new(StatusCode::NO_CONTENT, "")));
        let api = client(&transport);

        api.like_post("p1").await.unwrap();
        api.unlike_post("p1").await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[1].method, Method::DELETE);
        assert!(sent.iter().all(|r| r.path == "/posts/p1/like"));
    }

    #[tokio::test]
    async fn test_comment_on_post() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.body.as_ref().unwrap()["parentId"], "c-1");
            json(
                StatusCode::CREATED,
                value!({
                    "id": "c-2", "body": "agreed", "postId": "p1", "authorId": "u-1",
                    "authorName": "Ada", "parentId": "c-1", "createdAt": "2024-05-02T09:00:00Z"
                }),
            )
        });
        let api = client(&transport);

        let comment = api
            .create_comment("p1", &CommentCreate::reply_to("c-1", "agreed"))
            .await
            .unwrap();
        assert!(comment.is_reply());
        assert_eq!(transport.sent()[0].path, "/posts/p1/comments");
    }

    #[tokio::test]
    async fn test_list_tags_unwraps_response() {
        let transport = ScriptedTransport::new(|_| {
            json(StatusCode::OK, value!({ "tags": [{ "name": "rust", "postCount": 3 }] }))
        });
        let api = client(&transport);

        let tags = api.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "rust");
    }

    #[tokio::test]
    async fn test_featured_projects_query() {
        let transport = ScriptedTransport::new(|_| {
            json(StatusCode::OK, value!({ "items": [], "total": 0, "page": 1, "size": 10, "pages": 0 }))
        });
        let api = client(&transport);

        let page = api.list_projects(&ProjectQuery::featured()).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(
            transport.sent()[0].query,
            vec![("featured".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn test_generate_image_returns_data() {
        let transport = ScriptedTransport::new(|req| {
            assert_eq!(req.path, "/image-ai/generate-image");
            assert_eq!(req.body.as_ref().unwrap()["prompt"], "a lighthouse");
            json(StatusCode::OK, value!({ "image_data": "iVBORw0KGgo=" }))
        });
        let api = client(&transport);

        assert_eq!(api.generate_image("a lighthouse").await.unwrap(), "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_not_found_is_structured() {
        let transport = ScriptedTransport::new(|_| {
            json(
                StatusCode::NOT_FOUND,
                value!({ "code": "PROJECT_NOT_FOUND", "message": "Project not found" }),
            )
        });
        let api = client(&transport);

        let err = api.get_project("missing").await.unwrap_err();
        assert_eq!(err.code(), "PROJECT_NOT_FOUND");
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_bad_id_is_rejected_locally() {
        let transport = ScriptedTransport::new(|_| panic!("no request expected"));
        let api = client(&transport);

        let err = api.delete_post("../users").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
        assert!(api.get_post("  ").await.is_err());
        assert!(transport.sent().is_empty());
    }
}
