//! Form repository.
//!
//! Forms are the parents of tabs and the primary owners of open-form
//! bindings, so the transfer orchestrator writes them before either.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{EntityKind, Error, Form, Result, resolve_id};

use crate::captions::{CaptionMap, PgCaptionRepository};

/// Request to create or update a form.
#[derive(Debug, Clone)]
pub struct SetFormRequest {
    pub id: Option<Uuid>,
    pub module_id: Uuid,
    pub name: String,
    /// Full target caption map; `None` leaves stored captions untouched.
    pub captions: Option<CaptionMap>,
}

/// PostgreSQL form repository.
#[derive(Clone)]
pub struct PgFormRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
    captions: PgCaptionRepository,
}

impl PgFormRepository {
    /// Create a new PgFormRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let captions = PgCaptionRepository::new(pool.clone());
        Self { pool, captions }
    }

    /// List the forms of a module, ordered by name ascending. The ordering
    /// is part of the contract.
    pub async fn list_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        module_id: Uuid,
    ) -> Result<Vec<Form>> {
        let rows = sqlx::query(
            r#"
            SELECT id, module_id, name, created_at, updated_at
            FROM form
            WHERE module_id = $1
            ORDER BY name
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| row_to_form(&r)).collect())
    }

    /// Get a form by id within a transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Form>> {
        let row = sqlx::query(
            r#"
            SELECT id, module_id, name, created_at, updated_at
            FROM form
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| row_to_form(&r)))
    }

    /// Create or update a form within a transaction, returning its id.
    ///
    /// Validation runs before any write. The probe-then-write sequence is
    /// row-locked so concurrent writers of the same id serialize here.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: SetFormRequest,
    ) -> Result<Uuid> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Form name is required".to_string()));
        }

        let id = resolve_id(req.id);
        let now = Utc::now();

        let known: Option<Uuid> = sqlx::query_scalar("SELECT id FROM form WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        if known.is_some() {
            sqlx::query(
                r#"
                UPDATE form
                SET module_id = $2, name = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(req.module_id)
            .bind(&req.name)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO form (id, module_id, name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                "#,
            )
            .bind(id)
            .bind(req.module_id)
            .bind(&req.name)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        if let Some(captions) = &req.captions {
            self.captions
                .set_tx(tx, EntityKind::Form, id, captions)
                .await?;
        }

        debug!(
            subsystem = "db",
            component = "forms",
            op = "set",
            entity_id = %id,
            inserted = known.is_none(),
            "Form persisted"
        );
        Ok(id)
    }

    /// Delete a form by id within a transaction.
    ///
    /// Bindings targeting the form cascade through their foreign key; the
    /// form's tabs, the bindings it owns, and the captions of all of them
    /// key on polymorphic owner columns and are cleaned up here.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM caption
            WHERE owner_kind = 'tab' AND owner_id IN
                (SELECT id FROM tab WHERE owner_kind = 'form' AND owner_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM tab WHERE owner_kind = 'form' AND owner_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM open_form WHERE owner_kind = 'form' AND owner_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM form WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        self.captions
            .delete_all_tx(tx, EntityKind::Form, id)
            .await?;
        Ok(())
    }
}

fn row_to_form(r: &sqlx::postgres::PgRow) -> Form {
    Form {
        id: r.get("id"),
        module_id: r.get("module_id"),
        name: r.get("name"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}
