//! Display/behavior settings repository.
//!
//! A settings record belongs to exactly one owner: a login or a login
//! template, never both and never neither. The invariant is checked on
//! every read and write through [`SettingsOwner::from_columns`], with a
//! `CHECK` constraint in storage as the backstop.

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use appdeck_core::{new_v7, Error, Result, Settings, SettingsOwner};

/// PostgreSQL settings repository.
#[derive(Clone)]
pub struct PgSettingsRepository {
    #[allow(dead_code)]
    pool: Pool<Postgres>,
}

impl PgSettingsRepository {
    /// Create a new PgSettingsRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get the settings of one owner. Absent settings are `Ok(None)`.
    ///
    /// The owner columns of the stored row are re-validated on the way out;
    /// a row violating the exactly-one invariant surfaces as
    /// `Error::InvalidInput` rather than a half-usable value.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: SettingsOwner,
    ) -> Result<Option<Settings>> {
        let (login_id, login_template_id) = owner.into_columns();

        let row = sqlx::query(
            r#"
            SELECT id, login_id, login_template_id, prefs, created_at, updated_at
            FROM user_settings
            WHERE login_id IS NOT DISTINCT FROM $1
              AND login_template_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(login_id)
        .bind(login_template_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.map(|r| {
            let owner = SettingsOwner::from_columns(r.get("login_id"), r.get("login_template_id"))?;
            Ok(Settings {
                id: r.get("id"),
                owner,
                prefs: r.get("prefs"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    /// Create or update the settings of one owner, returning the record id.
    pub async fn set_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: SettingsOwner,
        prefs: JsonValue,
    ) -> Result<Uuid> {
        if !prefs.is_object() {
            return Err(Error::InvalidInput(
                "Settings prefs must be a JSON object".to_string(),
            ));
        }

        let (login_id, login_template_id) = owner.into_columns();
        // Round-trip through the checked constructor: a malformed owner can
        // never reach the write below.
        SettingsOwner::from_columns(login_id, login_template_id)?;

        let now = Utc::now();

        let known: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM user_settings
            WHERE login_id IS NOT DISTINCT FROM $1
              AND login_template_id IS NOT DISTINCT FROM $2
            FOR UPDATE
            "#,
        )
        .bind(login_id)
        .bind(login_template_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let id = match known {
            Some(id) => {
                sqlx::query("UPDATE user_settings SET prefs = $2, updated_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(&prefs)
                    .bind(now)
                    .execute(&mut **tx)
                    .await
                    .map_err(Error::Database)?;
                id
            }
            None => {
                let id = new_v7();
                sqlx::query(
                    r#"
                    INSERT INTO user_settings (id, login_id, login_template_id, prefs,
                                               created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    "#,
                )
                .bind(id)
                .bind(login_id)
                .bind(login_template_id)
                .bind(&prefs)
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
                id
            }
        };

        debug!(
            subsystem = "db",
            component = "settings",
            op = "set",
            entity_id = %id,
            "Settings persisted"
        );
        Ok(id)
    }

    /// Delete the settings of one owner. Absent settings are a no-op.
    pub async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: SettingsOwner,
    ) -> Result<()> {
        let (login_id, login_template_id) = owner.into_columns();

        sqlx::query(
            r#"
            DELETE FROM user_settings
            WHERE login_id IS NOT DISTINCT FROM $1
              AND login_template_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(login_id)
        .bind(login_template_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
