//! Localized caption storage.
//!
//! Captions are optional display text keyed by (entity kind, entity id,
//! field name). An entity without captions is valid; the store never treats
//! an empty result as an error. Writes use replace-all-for-entity
//! semantics: the caller hands over the full target caption map and the
//! store reconciles by deleting everything for the entity and re-inserting.

use std::collections::HashMap;

use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use appdeck_core::{EntityKind, Error, Result};

/// Map of caption field name to localized text.
pub type CaptionMap = HashMap<String, String>;

/// PostgreSQL caption repository.
#[derive(Clone)]
pub struct PgCaptionRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl PgCaptionRepository {
    /// Create a new PgCaptionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch the named caption fields for one entity within a transaction.
    ///
    /// Fields without a stored caption are simply absent from the returned
    /// map.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
        fields: &[&str],
    ) -> Result<CaptionMap> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let rows = sqlx::query(
            r#"
            SELECT field, text
            FROM caption
            WHERE owner_kind = $1 AND owner_id = $2 AND field = ANY($3::text[])
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .bind(&fields)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("field"), r.get("text")))
            .collect())
    }

    /// Fetch every stored caption for one entity within a transaction.
    pub async fn get_all_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
    ) -> Result<CaptionMap> {
        let rows = sqlx::query(
            r#"
            SELECT field, text
            FROM caption
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY field
            "#,
        )
        .bind(owner_kind.as_str())
        .bind(owner_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("field"), r.get("text")))
            .collect())
    }

    /// Replace every caption of one entity with the given map.
    ///
    /// Existing captions are not merged field by field; the map is the full
    /// target state. An empty map clears all captions for the entity.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
        captions: &CaptionMap,
    ) -> Result<()> {
        if !owner_kind.supports_captions() {
            return Err(Error::InvalidInput(format!(
                "Entity kind '{}' does not carry captions",
                owner_kind
            )));
        }

        sqlx::query("DELETE FROM caption WHERE owner_kind = $1 AND owner_id = $2")
            .bind(owner_kind.as_str())
            .bind(owner_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for (field, text) in captions {
            sqlx::query(
                r#"
                INSERT INTO caption (owner_kind, owner_id, field, text)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(owner_kind.as_str())
            .bind(owner_id)
            .bind(field)
            .bind(text)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        Ok(())
    }

    /// Delete every caption of one entity within a transaction.
    pub async fn delete_all_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM caption WHERE owner_kind = $1 AND owner_id = $2")
            .bind(owner_kind.as_str())
            .bind(owner_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
