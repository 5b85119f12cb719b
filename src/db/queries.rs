// Article and comment queries for SurrealDB.
//
// These are the data-access collaborators of the HTTP surface. Nothing in here
// makes an authorization decision; callers run the ownership guard first.

use crate::db::schema::*;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use surrealdb::{engine::any::Any, Surreal};
use uuid::Uuid;

pub struct QueryBuilder;

impl QueryBuilder {
    /// Insert a new article and return the stored record.
    pub async fn create_article(
        db: &Surreal<Any>,
        data: &ArticleCreate,
    ) -> Result<ArticleRecord> {
        let slug = Uuid::new_v4().simple().to_string();

        let mut res = db
            .query(
                r#"
                CREATE article CONTENT {
                    slug: $slug,
                    title: $title,
                    content: $content,
                    image_url: $image_url,
                    tags: $tags,
                    author_email: $author_email,
                    author_name: $author_name,
                    created_at: $created_at
                }
                "#,
            )
            .bind(("slug", slug))
            .bind(("title", data.title.clone()))
            .bind(("content", data.content.clone()))
            .bind(("image_url", data.image_url.clone()))
            .bind(("tags", data.tags.clone()))
            .bind(("author_email", data.author_email.clone()))
            .bind(("author_name", data.author_name.clone()))
            .bind(("created_at", Utc::now()))
            .await?;

        let created: Vec<ArticleRecord> = res.take(0)?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("failed to create article record"))
    }

    /// Fetch a single article by slug.
    pub async fn find_article(db: &Surreal<Any>, slug: &str) -> Result<Option<ArticleRecord>> {
        let mut res = db
            .query("SELECT * FROM article WHERE slug = $slug LIMIT 1")
            .bind(("slug", slug.to_string()))
            .await?;

        let articles: Vec<ArticleRecord> = res.take(0)?;
        Ok(articles.into_iter().next())
    }

    /// List every article, newest first.
    pub async fn list_articles(db: &Surreal<Any>) -> Result<Vec<ArticleRecord>> {
        let mut res = db.query("SELECT * FROM article").await?;
        let articles: Vec<ArticleRecord> = res.take(0)?;
        Ok(newest_first(articles))
    }

    /// Case-insensitive substring search over title and content.
    pub async fn search_articles(db: &Surreal<Any>, needle: &str) -> Result<Vec<ArticleRecord>> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM article
                WHERE string::contains(string::lowercase(title), $needle)
                   OR string::contains(string::lowercase(content), $needle)
                "#,
            )
            .bind(("needle", needle.to_lowercase()))
            .await?;

        let articles: Vec<ArticleRecord> = res.take(0)?;
        Ok(newest_first(articles))
    }

    /// Articles carrying the given (already normalized) tag.
    pub async fn articles_by_tag(db: &Surreal<Any>, tag: &str) -> Result<Vec<ArticleRecord>> {
        let mut res = db
            .query("SELECT * FROM article WHERE tags CONTAINS $tag")
            .bind(("tag", tag.to_string()))
            .await?;

        let articles: Vec<ArticleRecord> = res.take(0)?;
        Ok(newest_first(articles))
    }

    /// Replace the editable fields of an article.
    pub async fn update_article(
        db: &Surreal<Any>,
        slug: &str,
        data: &ArticleUpdate,
    ) -> Result<ArticleRecord> {
        let mut res = db
            .query(
                r#"
                UPDATE article SET
                    title = $title,
                    content = $content,
                    image_url = $image_url,
                    tags = $tags,
                    updated_at = $updated_at
                WHERE slug = $slug
                RETURN AFTER
                "#,
            )
            .bind(("slug", slug.to_string()))
            .bind(("title", data.title.clone()))
            .bind(("content", data.content.clone()))
            .bind(("image_url", data.image_url.clone()))
            .bind(("tags", data.tags.clone()))
            .bind(("updated_at", Utc::now()))
            .await?;

        let updated: Vec<ArticleRecord> = res.take(0)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("article {} disappeared during update", slug))
    }

    /// Delete an article together with its comments.
    pub async fn delete_article(db: &Surreal<Any>, slug: &str) -> Result<()> {
        db.query(
            r#"
            BEGIN TRANSACTION;
            DELETE comment WHERE article_slug = $slug;
            DELETE article WHERE slug = $slug;
            COMMIT TRANSACTION;
            "#,
        )
        .bind(("slug", slug.to_string()))
        .await?
        .check()?;

        Ok(())
    }

    /// Distinct tag names across all articles, sorted.
    pub async fn list_tags(db: &Surreal<Any>) -> Result<Vec<String>> {
        let mut res = db.query("SELECT VALUE tags FROM article").await?;
        let tags: Vec<Vec<String>> = res.take(0)?;

        let unique: BTreeSet<String> = tags.into_iter().flatten().collect();
        Ok(unique.into_iter().collect())
    }

    /// Insert a comment on an article.
    pub async fn create_comment(
        db: &Surreal<Any>,
        data: &CommentCreate,
    ) -> Result<CommentRecord> {
        let mut res = db
            .query(
                r#"
                CREATE comment CONTENT {
                    article_slug: $article_slug,
                    content: $content,
                    author_email: $author_email,
                    author_name: $author_name,
                    created_at: $created_at
                }
                "#,
            )
            .bind(("article_slug", data.article_slug.clone()))
            .bind(("content", data.content.clone()))
            .bind(("author_email", data.author_email.clone()))
            .bind(("author_name", data.author_name.clone()))
            .bind(("created_at", Utc::now()))
            .await?;

        let created: Vec<CommentRecord> = res.take(0)?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("failed to create comment record"))
    }

    /// Comments on an article, oldest first.
    pub async fn list_comments(db: &Surreal<Any>, article_slug: &str) -> Result<Vec<CommentRecord>> {
        let mut res = db
            .query("SELECT * FROM comment WHERE article_slug = $article_slug")
            .bind(("article_slug", article_slug.to_string()))
            .await?;

        let mut comments: Vec<CommentRecord> = res.take(0)?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }
}

fn newest_first(mut articles: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    articles
}
