use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub image: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Author's user id
    pub uid: String,
    /// Author's display name
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub liked_by_me: bool,
}

impl Post {
    /// Tags rendered as `#tag` separated by spaces.
    pub fn hashtags(&self) -> String {
        self.tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PostCreate {
    pub title: String,
    pub image: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Filters for `GET /posts`.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    /// Free-text search (title and tags)
    pub q: Option<String>,
    /// Only posts by this author
    pub uid: Option<String>,
    pub page: u32,
    pub size: u32,
}

impl PostQuery {
    pub fn search(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Self::default()
        }
    }

    pub fn by_author(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    /// Query pairs, skipping anything unset or empty.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            pairs.push(("q".to_string(), q.to_string()));
        }
        if let Some(uid) = self.uid.as_deref().filter(|u| !u.is_empty()) {
            pairs.push(("uid".to_string(), uid.to_string()));
        }
        if self.page > 0 {
            pairs.push(("page".to_string(), self.page.to_string()));
        }
        if self.size > 0 {
            pairs.push(("size".to_string(), self.size.to_string()));
        }
        pairs
    }
}
