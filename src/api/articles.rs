// Article endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, error::ApiError, require_caller};
use crate::auth::{IdentityContext, OwnershipGuard};
use crate::db::{ArticleCreate, ArticleRecord, ArticleUpdate, QueryBuilder};
use crate::types::ArticleSlug;

/// Body of create and update requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArticleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::BadRequest("Title must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(ApiError::BadRequest("Content must not be empty".to_string()));
        }
        Ok(())
    }

    fn image_url(&self) -> Option<String> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

/// Article as returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the caller may edit or delete this article
    pub can_edit: bool,
}

impl ArticleView {
    fn new(article: ArticleRecord, ctx: &IdentityContext) -> Self {
        let can_edit = OwnershipGuard::is_owner(&article, ctx);
        Self {
            id: article.slug,
            title: article.title,
            content: article.content,
            image_url: article.image_url,
            tags: article.tags,
            author_name: article.author_name,
            created_at: article.created_at,
            updated_at: article.updated_at,
            can_edit,
        }
    }

    fn list(articles: Vec<ArticleRecord>, ctx: &IdentityContext) -> Vec<Self> {
        articles.into_iter().map(|a| Self::new(a, ctx)).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct TagParams {
    pub name: String,
}

/// Trim, lower-case, drop empties and duplicates, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub(super) async fn load_article(state: &AppState, slug: &ArticleSlug) -> Result<ArticleRecord, ApiError> {
    QueryBuilder::find_article(&state.db, slug.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "Article",
            id: slug.to_string(),
        })
}

pub async fn list_articles(
    State(state): State<AppState>,
    ctx: IdentityContext,
) -> Result<Json<Vec<ArticleView>>, ApiError> {
    let articles = QueryBuilder::list_articles(&state.db).await?;
    Ok(Json(ArticleView::list(articles, &ctx)))
}

pub async fn search_articles(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ArticleView>>, ApiError> {
    let needle = params.q.trim().to_lowercase();
    let articles = if needle.is_empty() {
        QueryBuilder::list_articles(&state.db).await?
    } else {
        QueryBuilder::search_articles(&state.db, &needle).await?
    };
    Ok(Json(ArticleView::list(articles, &ctx)))
}

pub async fn articles_by_tag(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Query(params): Query<TagParams>,
) -> Result<Json<Vec<ArticleView>>, ApiError> {
    let tag = params.name.trim().to_lowercase();
    let articles = QueryBuilder::articles_by_tag(&state.db, &tag).await?;
    Ok(Json(ArticleView::list(articles, &ctx)))
}

pub async fn get_article(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(slug): Path<ArticleSlug>,
) -> Result<Json<ArticleView>, ApiError> {
    let article = load_article(&state, &slug).await?;
    Ok(Json(ArticleView::new(article, &ctx)))
}

pub async fn create_article(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Json(payload): Json<ArticleRequest>,
) -> Result<(StatusCode, Json<ArticleView>), ApiError> {
    let caller = require_caller(&ctx)?;
    payload.validate()?;

    // The gate only publishes principals it found, but the account may
    // have been removed since.
    let author = state
        .users
        .find_by_email(caller.as_str())
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let data = ArticleCreate {
        title: payload.title.trim().to_string(),
        content: payload.content.clone(),
        image_url: payload.image_url(),
        tags: normalize_tags(&payload.tags),
        author_email: author.email,
        author_name: author.name,
    };

    let article = QueryBuilder::create_article(&state.db, &data).await?;
    info!(article = %article.slug, author = %caller, "Article created");

    Ok((StatusCode::CREATED, Json(ArticleView::new(article, &ctx))))
}

pub async fn update_article(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(slug): Path<ArticleSlug>,
    Json(payload): Json<ArticleRequest>,
) -> Result<Json<ArticleView>, ApiError> {
    require_caller(&ctx)?;
    payload.validate()?;

    let article = load_article(&state, &slug).await?;
    OwnershipGuard::authorize(&article, &ctx)?;

    let data = ArticleUpdate {
        title: payload.title.trim().to_string(),
        content: payload.content.clone(),
        image_url: payload.image_url(),
        tags: normalize_tags(&payload.tags),
    };

    let updated = QueryBuilder::update_article(&state.db, slug.as_str(), &data).await?;
    info!(article = %slug, "Article updated");

    Ok(Json(ArticleView::new(updated, &ctx)))
}

pub async fn delete_article(
    State(state): State<AppState>,
    ctx: IdentityContext,
    Path(slug): Path<ArticleSlug>,
) -> Result<StatusCode, ApiError> {
    require_caller(&ctx)?;

    let article = load_article(&state, &slug).await?;
    OwnershipGuard::authorize(&article, &ctx)?;

    QueryBuilder::delete_article(&state.db, slug.as_str()).await?;
    info!(article = %slug, "Article deleted");

    Ok(StatusCode::NO_CONTENT)
}
