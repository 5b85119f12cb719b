use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "techblog".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "blog".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Principals; email is the login handle and must be unique
        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS user_email ON TABLE user COLUMNS email UNIQUE;",

        // Articles are addressed by slug in the public API
        "DEFINE TABLE IF NOT EXISTS article SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS article_slug ON TABLE article COLUMNS slug UNIQUE;
         DEFINE INDEX IF NOT EXISTS article_author ON TABLE article COLUMNS author_email;",

        "DEFINE TABLE IF NOT EXISTS comment SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS comment_article ON TABLE comment COLUMNS article_slug;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
