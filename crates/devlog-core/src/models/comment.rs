use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comment {
    pub id: String,
    pub body: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    #[serde(rename = "authorId")]
    pub author_id: String,
    #[serde(rename = "authorName")]
    pub author_name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "replyCount", default)]
    pub reply_count: i64,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommentCreate {
    pub body: String,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CommentCreate {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            parent_id: None,
        }
    }

    pub fn reply_to(parent_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            parent_id: Some(parent_id.into()),
        }
    }
}
