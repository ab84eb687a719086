//! Help article repository.
//!
//! Articles are named children of a module and list in name order.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{Article, EntityKind, Error, Result, resolve_id};

use crate::captions::{CaptionMap, PgCaptionRepository};

/// Request to create or update an article.
#[derive(Debug, Clone)]
pub struct SetArticleRequest {
    pub id: Option<Uuid>,
    pub module_id: Uuid,
    pub name: String,
    pub body: String,
    pub format: String,
    /// Full target caption map; `None` leaves stored captions untouched.
    pub captions: Option<CaptionMap>,
}

/// PostgreSQL article repository.
#[derive(Clone)]
pub struct PgArticleRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
    captions: PgCaptionRepository,
}

impl PgArticleRepository {
    /// Create a new PgArticleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let captions = PgCaptionRepository::new(pool.clone());
        Self { pool, captions }
    }

    /// List the articles of a module, ordered by name ascending. The
    /// ordering is part of the contract.
    pub async fn list_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        module_id: Uuid,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT id, module_id, name, body, format, created_at, updated_at
            FROM article
            WHERE module_id = $1
            ORDER BY name
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_article).collect())
    }

    /// Get an article by id within a transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Article>> {
        let row = sqlx::query(
            r#"
            SELECT id, module_id, name, body, format, created_at, updated_at
            FROM article
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_article))
    }

    /// Create or update an article within a transaction, returning its id.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: SetArticleRequest,
    ) -> Result<Uuid> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Article name is required".to_string()));
        }
        if req.format.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Article format is required".to_string(),
            ));
        }

        let id = resolve_id(req.id);
        let now = Utc::now();

        let known: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM article WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;

        if known.is_some() {
            sqlx::query(
                r#"
                UPDATE article
                SET module_id = $2, name = $3, body = $4, format = $5, updated_at = $6
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(req.module_id)
            .bind(&req.name)
            .bind(&req.body)
            .bind(&req.format)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO article (id, module_id, name, body, format, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                "#,
            )
            .bind(id)
            .bind(req.module_id)
            .bind(&req.name)
            .bind(&req.body)
            .bind(&req.format)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        if let Some(captions) = &req.captions {
            self.captions
                .set_tx(tx, EntityKind::Article, id, captions)
                .await?;
        }

        debug!(
            subsystem = "db",
            component = "articles",
            op = "set",
            entity_id = %id,
            inserted = known.is_none(),
            "Article persisted"
        );
        Ok(id)
    }

    /// Delete an article by id within a transaction.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM article WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        self.captions
            .delete_all_tx(tx, EntityKind::Article, id)
            .await?;
        Ok(())
    }
}

fn row_to_article(r: &sqlx::postgres::PgRow) -> Article {
    Article {
        id: r.get("id"),
        module_id: r.get("module_id"),
        name: r.get("name"),
        body: r.get("body"),
        format: r.get("format"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}
