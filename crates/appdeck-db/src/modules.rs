//! Module metadata repository.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{AppModule, Error, Result, resolve_id};

/// Request to create or update a module.
#[derive(Debug, Clone)]
pub struct SetModuleRequest {
    /// Absent or nil id means the store assigns a fresh one.
    pub id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
}

/// PostgreSQL module repository.
#[derive(Clone)]
pub struct PgModuleRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl PgModuleRepository {
    /// Create a new PgModuleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a module by id within a transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<AppModule>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM app_module
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| AppModule {
            id: r.get("id"),
            name: r.get("name"),
            description: r.get("description"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Create or update a module within a transaction, returning its id.
    ///
    /// Identity resolves first: a missing id gets a fresh UUIDv7. The
    /// existence probe locks the row (`FOR UPDATE`) so a concurrent import
    /// of the same module serializes on the probe instead of both deciding
    /// to insert.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: SetModuleRequest,
    ) -> Result<Uuid> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Module name is required".to_string()));
        }

        let id = resolve_id(req.id);
        let now = Utc::now();

        let known: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM app_module WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;

        if known.is_some() {
            sqlx::query(
                r#"
                UPDATE app_module
                SET name = $2, description = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&req.name)
            .bind(&req.description)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO app_module (id, name, description, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                "#,
            )
            .bind(id)
            .bind(&req.name)
            .bind(&req.description)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        debug!(
            subsystem = "db",
            component = "modules",
            op = "set",
            module_id = %id,
            inserted = known.is_none(),
            "Module persisted"
        );
        Ok(id)
    }

    /// Delete a module by id within a transaction.
    ///
    /// Forms, articles, and bindings cascade through their foreign keys.
    /// Tabs and captions key on polymorphic (owner_kind, owner_id) columns
    /// with no foreign key, so the whole subtree is cleaned up here before
    /// the module row goes.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM caption
            WHERE (owner_kind = 'module' AND owner_id = $1)
               OR (owner_kind = 'form' AND owner_id IN
                    (SELECT id FROM form WHERE module_id = $1))
               OR (owner_kind = 'article' AND owner_id IN
                    (SELECT id FROM article WHERE module_id = $1))
               OR (owner_kind = 'tab' AND owner_id IN
                    (SELECT id FROM tab
                     WHERE (owner_kind = 'module' AND owner_id = $1)
                        OR (owner_kind = 'form' AND owner_id IN
                             (SELECT id FROM form WHERE module_id = $1))))
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            r#"
            DELETE FROM tab
            WHERE (owner_kind = 'module' AND owner_id = $1)
               OR (owner_kind = 'form' AND owner_id IN
                    (SELECT id FROM form WHERE module_id = $1))
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM app_module WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
