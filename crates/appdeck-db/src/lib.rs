//! # appdeck-db
//!
//! PostgreSQL entity store and transfer orchestrator for appdeck modules.
//!
//! This crate provides:
//! - Connection pool management
//! - Per-entity repositories with transaction-scoped `_tx` operations
//!   (modules, forms, tabs, articles, open-form bindings, captions,
//!   settings)
//! - The [`TransferService`] that exports a module to a transfer file and
//!   imports one back, applying compatibility migrations for files written
//!   by older platform revisions
//!
//! ## Example
//!
//! ```rust,ignore
//! use appdeck_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/appdeck").await?;
//!     let transfer = db.transfer.export_module(module_id).await?;
//!     println!("exported {} forms", transfer.forms.len());
//!     Ok(())
//! }
//! ```

pub mod articles;
pub mod captions;
pub mod forms;
pub mod modules;
pub mod open_forms;
pub mod pool;
pub mod settings;
pub mod tabs;
pub mod transfer;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use appdeck_core::*;

// Re-export repository implementations
pub use articles::{PgArticleRepository, SetArticleRequest};
pub use captions::{CaptionMap, PgCaptionRepository};
pub use forms::{PgFormRepository, SetFormRequest};
pub use modules::{PgModuleRepository, SetModuleRequest};
pub use open_forms::{PgOpenFormRepository, SetOpenFormRequest};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use settings::PgSettingsRepository;
pub use tabs::{PgTabRepository, SetTabRequest};
pub use transfer::TransferService;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Module metadata repository.
    pub modules: PgModuleRepository,
    /// Form repository.
    pub forms: PgFormRepository,
    /// Tab repository (ordered children, cache-busting counters).
    pub tabs: PgTabRepository,
    /// Help article repository.
    pub articles: PgArticleRepository,
    /// Open-form binding repository.
    pub open_forms: PgOpenFormRepository,
    /// Localized caption repository.
    pub captions: PgCaptionRepository,
    /// Login/login-template settings repository.
    pub settings: PgSettingsRepository,
    /// Module export/import orchestrator.
    pub transfer: TransferService,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            modules: PgModuleRepository::new(pool.clone()),
            forms: PgFormRepository::new(pool.clone()),
            tabs: PgTabRepository::new(pool.clone()),
            articles: PgArticleRepository::new(pool.clone()),
            open_forms: PgOpenFormRepository::new(pool.clone()),
            captions: PgCaptionRepository::new(pool.clone()),
            settings: PgSettingsRepository::new(pool.clone()),
            transfer: TransferService::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
