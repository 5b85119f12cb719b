use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Persisted principal. Owned by the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable database identifier (table: `user`)
    pub id: RecordId,
    /// Login handle, unique across the table
    pub email: String,
    /// Display name shown as article author
    pub name: String,
    /// Argon2 PHC string; never leaves the server
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Persisted blog article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Public identifier used in routes
    pub slug: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    /// Normalized tag names (trimmed, lower-case, unique)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Login handle of the author. `None` only for inconsistent data.
    pub author_email: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCreate {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub author_email: String,
    pub author_name: String,
}

/// Payload for replacing the editable fields of an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
}

/// Persisted comment on an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: RecordId,
    pub article_slug: String,
    pub content: String,
    pub author_email: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreate {
    pub article_slug: String,
    pub content: String,
    pub author_email: String,
    pub author_name: String,
}

impl crate::auth::OwnableResource for ArticleRecord {
    fn owner_handle(&self) -> Option<&str> {
        self.author_email.as_deref()
    }

    fn resource_label(&self) -> String {
        format!("article:{}", self.slug)
    }
}
