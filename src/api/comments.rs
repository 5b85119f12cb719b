// Comment endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppState, articles::load_article, error::ApiError, require_caller};
use crate::auth::IdentityContext;
use crate::db::{CommentCreate, CommentRecord, QueryBuilder};
use crate::types::ArticleSlug;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRecord> for CommentView {
    fn from(comment: CommentRecord) -> Self {
        Self {
            id: comment.id.to_string(),
            content: comment.content,
            author_name: comment.author_name,
            created_at: comment.created_at,
        }
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<ArticleSlug>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    load_article(&state, &slug).await?;

    let comments = QueryBuilder::list_comments(&state.db, slug.as_str()).await?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(slug): Path<ArticleSlug>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let caller = require_caller(&ctx)?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment must not be empty".to_string()));
    }

    load_article(&state, &slug).await?;

    let author = state
        .users
        .find_by_email(caller.as_str())
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let data = CommentCreate {
        article_slug: slug.into_inner(),
        content: content.to_string(),
        author_email: author.email,
        author_name: author.name,
    };

    let comment = QueryBuilder::create_comment(&state.db, &data).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}
