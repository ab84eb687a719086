//! Open-form binding repository.
//!
//! A binding decides which form opens when a source entity (form, field, or
//! relation) is activated, optionally scoped by a context string; NULL
//! context is the default context. The (owner, context) uniqueness is
//! enforced by delete-then-insert inside the caller's transaction, not by a
//! unique-violation check, so setting the same slot twice replaces the
//! prior binding while distinct contexts coexist.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{EntityKind, Error, OpenFormBinding, Result, resolve_id};

/// Request to set an open-form binding for one (owner, context) slot.
#[derive(Debug, Clone)]
pub struct SetOpenFormRequest {
    pub id: Option<Uuid>,
    pub module_id: Uuid,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub context: Option<String>,
    pub target_form_id: Uuid,
    pub relation_index: i32,
}

/// PostgreSQL open-form binding repository.
#[derive(Clone)]
pub struct PgOpenFormRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl PgOpenFormRepository {
    /// Create a new PgOpenFormRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get the binding for one (owner, context) slot. No binding configured
    /// is a valid state and returns `Ok(None)`.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
        context: Option<&str>,
    ) -> Result<Option<OpenFormBinding>> {
        check_owner_kind(owner_kind)?;

        let row = sqlx::query(
            r#"
            SELECT id, module_id, owner_kind, owner_id, context, target_form_id,
                   relation_index, created_at, updated_at
            FROM open_form
            WHERE owner_kind = $1 AND owner_id = $2
              AND context IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .bind(context)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_binding).transpose()
    }

    /// List every binding of one owner across all contexts.
    pub async fn list_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
    ) -> Result<Vec<OpenFormBinding>> {
        check_owner_kind(owner_kind)?;

        let rows = sqlx::query(
            r#"
            SELECT id, module_id, owner_kind, owner_id, context, target_form_id,
                   relation_index, created_at, updated_at
            FROM open_form
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY context NULLS FIRST
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_binding).collect()
    }

    /// List every binding belonging to a module, for export traversal.
    pub async fn list_for_module_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        module_id: Uuid,
    ) -> Result<Vec<OpenFormBinding>> {
        let rows = sqlx::query(
            r#"
            SELECT id, module_id, owner_kind, owner_id, context, target_form_id,
                   relation_index, created_at, updated_at
            FROM open_form
            WHERE module_id = $1
            ORDER BY owner_kind, owner_id, context NULLS FIRST
            "#,
        )
        .bind(module_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_binding).collect()
    }

    /// Set the binding for one (owner, context) slot, returning its id.
    ///
    /// Deletes whatever binding occupies the slot, then inserts the new one,
    /// so at most one binding per slot ever exists.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: SetOpenFormRequest,
    ) -> Result<Uuid> {
        check_owner_kind(req.owner_kind)?;

        let id = resolve_id(req.id);
        let now = Utc::now();

        sqlx::query(
            r#"
            DELETE FROM open_form
            WHERE owner_kind = $1 AND owner_id = $2
              AND context IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(req.owner_kind.as_str())
        .bind(req.owner_id)
        .bind(&req.context)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO open_form (id, module_id, owner_kind, owner_id, context,
                                   target_form_id, relation_index, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            "#,
        )
        .bind(id)
        .bind(req.module_id)
        .bind(req.owner_kind.as_str())
        .bind(req.owner_id)
        .bind(&req.context)
        .bind(req.target_form_id)
        .bind(req.relation_index)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "open_forms",
            op = "set",
            entity_id = %id,
            entity_kind = %req.owner_kind,
            "Open-form binding persisted"
        );
        Ok(id)
    }

    /// Delete the binding for one (owner, context) slot. Deleting an
    /// unoccupied slot is a no-op.
    pub async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
        context: Option<&str>,
    ) -> Result<()> {
        check_owner_kind(owner_kind)?;

        sqlx::query(
            r#"
            DELETE FROM open_form
            WHERE owner_kind = $1 AND owner_id = $2
              AND context IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .bind(context)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

/// An owner kind outside the whitelist is a caller programming error,
/// signaled as a hard failure.
fn check_owner_kind(kind: EntityKind) -> Result<()> {
    if kind.supports_open_forms() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Entity kind '{}' does not carry open-form bindings",
            kind
        )))
    }
}

fn row_to_binding(r: &sqlx::postgres::PgRow) -> Result<OpenFormBinding> {
    Ok(OpenFormBinding {
        id: r.get("id"),
        module_id: r.get("module_id"),
        owner_kind: EntityKind::parse(r.get("owner_kind"))?,
        owner_id: r.get("owner_id"),
        context: r.get("context"),
        target_form_id: r.get("target_form_id"),
        relation_index: r.get("relation_index"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
