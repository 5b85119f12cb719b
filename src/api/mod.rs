// REST API for the blog

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::Json,
    routing::{get, post},
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthGate, IdentityContext, TokenService, UserStore, authenticate};
use crate::config::AuthConfig;
use crate::db::{Db, QueryBuilder};
use crate::types::PrincipalHandle;

pub mod articles;
pub mod auth;
pub mod comments;
pub mod error;


use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub users: Arc<UserStore>,
    pub tokens: Arc<TokenService>,
    pub gate: AuthGate,
}

impl AppState {
    /// Wire the auth core around an open database.
    pub fn new(db: Db, users: UserStore, tokens: TokenService, config: &AuthConfig) -> Self {
        let users = Arc::new(users);
        let tokens = Arc::new(tokens);
        let gate = AuthGate::new(tokens.clone(), users.clone(), config);

        Self { db, users, tokens, gate }
    }
}

pub fn create_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin: HeaderValue = cors_origin
        .parse()
        .with_context(|| format!("invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route(
            "/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route("/articles/search", get(articles::search_articles))
        .route("/articles/tag", get(articles::articles_by_tag))
        .route(
            "/articles/{id}",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route(
            "/articles/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/tags", get(list_tags));

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.gate.clone(), authenticate::<UserStore>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(router)
}

/// The caller's handle, or 401 when the request is anonymous.
pub(crate) fn require_caller(ctx: &IdentityContext) -> Result<&PrincipalHandle, ApiError> {
    ctx.handle().ok_or(ApiError::Unauthenticated)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(QueryBuilder::list_tags(&state.db).await?))
}
