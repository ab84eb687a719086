//! Tab repository.
//!
//! Tabs are ordered children of a module or form. `position` drives render
//! order, so `list_tx` always returns ascending position; insertion order is
//! irrelevant. The `content_revision` counter cache-busts embedded content
//! and is bumped through [`PgTabRepository::touch_content_tx`].

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{EntityKind, Error, Result, Tab, resolve_id};

use crate::captions::{CaptionMap, PgCaptionRepository};

/// Request to create or update a tab.
#[derive(Debug, Clone)]
pub struct SetTabRequest {
    pub id: Option<Uuid>,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub name: String,
    pub position: i32,
    pub state: JsonValue,
    pub content_revision: i32,
    /// Full target caption map; `None` leaves stored captions untouched.
    pub captions: Option<CaptionMap>,
}

/// PostgreSQL tab repository.
#[derive(Clone)]
pub struct PgTabRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
    captions: PgCaptionRepository,
}

impl PgTabRepository {
    /// Create a new PgTabRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let captions = PgCaptionRepository::new(pool.clone());
        Self { pool, captions }
    }

    /// List the tabs of one owner, ordered by position ascending. Ties
    /// break on id so the order is stable.
    pub async fn list_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
    ) -> Result<Vec<Tab>> {
        if !owner_kind.supports_tabs() {
            return Err(Error::InvalidInput(format!(
                "Entity kind '{}' does not own tabs",
                owner_kind
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, owner_kind, owner_id, name, position, state,
                   content_revision, created_at, updated_at
            FROM tab
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY position, id
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_tab).collect()
    }

    /// Get a tab by id within a transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Tab>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_kind, owner_id, name, position, state,
                   content_revision, created_at, updated_at
            FROM tab
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_tab).transpose()
    }

    /// Create or update a tab within a transaction, returning its id.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: SetTabRequest,
    ) -> Result<Uuid> {
        if !req.owner_kind.supports_tabs() {
            return Err(Error::InvalidInput(format!(
                "Entity kind '{}' does not own tabs",
                req.owner_kind
            )));
        }
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Tab name is required".to_string()));
        }

        let id = resolve_id(req.id);
        let now = Utc::now();

        let known: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tab WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        if known.is_some() {
            sqlx::query(
                r#"
                UPDATE tab
                SET owner_kind = $2, owner_id = $3, name = $4, position = $5,
                    state = $6, content_revision = $7, updated_at = $8
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(req.owner_kind.as_str())
            .bind(req.owner_id)
            .bind(&req.name)
            .bind(req.position)
            .bind(&req.state)
            .bind(req.content_revision)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO tab (id, owner_kind, owner_id, name, position, state,
                                 content_revision, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                "#,
            )
            .bind(id)
            .bind(req.owner_kind.as_str())
            .bind(req.owner_id)
            .bind(&req.name)
            .bind(req.position)
            .bind(&req.state)
            .bind(req.content_revision)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        if let Some(captions) = &req.captions {
            self.captions
                .set_tx(tx, EntityKind::Tab, id, captions)
                .await?;
        }

        debug!(
            subsystem = "db",
            component = "tabs",
            op = "set",
            entity_id = %id,
            inserted = known.is_none(),
            "Tab persisted"
        );
        Ok(id)
    }

    /// Increment a tab's content revision, returning the new value.
    /// Clients use the revision to cache-bust embedded content.
    pub async fn touch_content_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<i32> {
        let revision: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE tab
            SET content_revision = content_revision + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING content_revision
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        revision.ok_or_else(|| Error::NotFound(format!("Tab not found: {}", id)))
    }

    /// Delete a tab by id within a transaction.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM tab WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        self.captions.delete_all_tx(tx, EntityKind::Tab, id).await?;
        Ok(())
    }
}

fn row_to_tab(r: &sqlx::postgres::PgRow) -> Result<Tab> {
    Ok(Tab {
        id: r.get("id"),
        owner_kind: EntityKind::parse(r.get("owner_kind"))?,
        owner_id: r.get("owner_id"),
        name: r.get("name"),
        position: r.get("position"),
        state: r.get("state"),
        content_revision: r.get("content_revision"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
