//! Module transfer orchestration.
//!
//! [`TransferService`] walks a module's full entity graph in fixed
//! dependency order — module metadata, forms, tabs, articles, open-form
//! bindings, captions — inside a single transaction per direction. On
//! import, every version-sensitive entity passes through the compatibility
//! migration pipeline in [`appdeck_core::compat`] before it reaches a
//! repository `set_tx`, so a file exported by an older platform revision
//! lands on the current schema without call-site special cases.
//!
//! Authentication and HTTP streaming live outside this crate; callers hand
//! the service an already-authorized request. Import is all-or-nothing: any
//! entity failure drops the transaction and nothing from the file persists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use appdeck_core::defaults::{
    DEFAULT_ARTICLE_FORMAT, DEFAULT_CONTENT_REVISION, DEFAULT_RELATION_INDEX, TRANSFER_FORMAT,
};
use appdeck_core::{
    compat, Article, ArticleRecord, CaptionRecord, EntityKind, Error, Form, FormRecord,
    ModuleRecord, ModuleTransfer, OpenFormBinding, OpenFormRecord, Result, SettingsOwner, Tab,
    TabRecord,
};

use crate::articles::{PgArticleRepository, SetArticleRequest};
use crate::captions::{CaptionMap, PgCaptionRepository};
use crate::forms::{PgFormRepository, SetFormRequest};
use crate::modules::{PgModuleRepository, SetModuleRequest};
use crate::open_forms::{PgOpenFormRepository, SetOpenFormRequest};
use crate::settings::PgSettingsRepository;
use crate::tabs::{PgTabRepository, SetTabRequest};

/// Orchestrates module export and import against the entity store.
#[derive(Clone)]
pub struct TransferService {
    pool: Pool<Postgres>,
    modules: PgModuleRepository,
    forms: PgFormRepository,
    tabs: PgTabRepository,
    articles: PgArticleRepository,
    open_forms: PgOpenFormRepository,
    captions: PgCaptionRepository,
    settings: PgSettingsRepository,
}

impl TransferService {
    /// Create a new TransferService with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            modules: PgModuleRepository::new(pool.clone()),
            forms: PgFormRepository::new(pool.clone()),
            tabs: PgTabRepository::new(pool.clone()),
            articles: PgArticleRepository::new(pool.clone()),
            open_forms: PgOpenFormRepository::new(pool.clone()),
            captions: PgCaptionRepository::new(pool.clone()),
            settings: PgSettingsRepository::new(pool.clone()),
            pool,
        }
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    /// Export one module's full entity graph as a transfer value.
    ///
    /// Runs inside a single read transaction; the traversal order is module
    /// metadata → forms → tabs → articles → open-form bindings → captions.
    /// Export fixups keep the emitted file self-describing for the current
    /// format revision.
    pub async fn export_module(&self, module_id: Uuid) -> Result<ModuleTransfer> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let module = self
            .modules
            .get_tx(&mut tx, module_id)
            .await?
            .ok_or(Error::ModuleNotFound(module_id))?;

        let forms = self.forms.list_tx(&mut tx, module_id).await?;

        let mut tabs: Vec<Tab> = self
            .tabs
            .list_tx(&mut tx, EntityKind::Module, module_id)
            .await?;
        for form in &forms {
            tabs.extend(
                self.tabs
                    .list_tx(&mut tx, EntityKind::Form, form.id)
                    .await?,
            );
        }

        let articles = self.articles.list_tx(&mut tx, module_id).await?;
        let open_forms = self.open_forms.list_for_module_tx(&mut tx, module_id).await?;

        let mut captions: Vec<CaptionRecord> = Vec::new();
        self.collect_captions(&mut tx, EntityKind::Module, module_id, &mut captions)
            .await?;
        for form in &forms {
            self.collect_captions(&mut tx, EntityKind::Form, form.id, &mut captions)
                .await?;
        }
        for tab in &tabs {
            self.collect_captions(&mut tx, EntityKind::Tab, tab.id, &mut captions)
                .await?;
        }
        for article in &articles {
            self.collect_captions(&mut tx, EntityKind::Article, article.id, &mut captions)
                .await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        let transfer = ModuleTransfer {
            format: TRANSFER_FORMAT.to_string(),
            exported_at: Utc::now(),
            module: ModuleRecord {
                id: module.id,
                name: module.name,
                description: module.description,
            },
            forms: forms.into_iter().map(form_to_record).collect(),
            tabs: tabs
                .into_iter()
                .map(|t| compat::export_tab(tab_to_record(t)))
                .collect(),
            articles: articles
                .into_iter()
                .map(|a| compat::export_article(article_to_record(a)))
                .collect(),
            open_forms: open_forms
                .into_iter()
                .map(|b| compat::export_open_form(binding_to_record(b)))
                .collect(),
            captions,
            // The schema has no module → login-template link, so exports
            // carry no settings defaults. The section exists for files
            // authored by installations that ship template defaults with a
            // module; import persists those.
            settings: Vec::new(),
        };

        info!(
            subsystem = "transfer",
            component = "export",
            op = "export_module",
            module_id = %module_id,
            entity_count = transfer.forms.len()
                + transfer.tabs.len()
                + transfer.articles.len()
                + transfer.open_forms.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Module exported"
        );
        Ok(transfer)
    }

    /// Export a module to a temporary JSON artifact in `dir`, returning the
    /// artifact path. The caller streams the file and then removes it via
    /// [`TransferService::remove_artifact`].
    pub async fn export_to_file(&self, module_id: Uuid, dir: &Path) -> Result<PathBuf> {
        let transfer = self.export_module(module_id).await?;
        let bytes = serde_json::to_vec_pretty(&transfer)?;

        let path = dir.join(format!("module-{}.json", module_id));
        tokio::fs::write(&path, bytes).await.map_err(Error::Io)?;
        Ok(path)
    }

    /// Best-effort removal of an export artifact.
    ///
    /// By the time cleanup runs the response has already been delivered, so
    /// a failure is logged as a warning and never escalated.
    pub async fn remove_artifact(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(
                subsystem = "transfer",
                component = "export",
                op = "remove_artifact",
                path = %path.display(),
                error = %e,
                "Failed to remove export artifact"
            );
        }
    }

    async fn collect_captions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_kind: EntityKind,
        owner_id: Uuid,
        out: &mut Vec<CaptionRecord>,
    ) -> Result<()> {
        let map = self.captions.get_all_tx(tx, owner_kind, owner_id).await?;
        let mut fields: Vec<_> = map.into_iter().collect();
        fields.sort();
        out.extend(fields.into_iter().map(|(field, text)| CaptionRecord {
            owner_kind,
            owner_id,
            field,
            text,
        }));
        Ok(())
    }

    // =========================================================================
    // IMPORT
    // =========================================================================

    /// Import a transfer value, creating or updating the module it
    /// describes. Returns the module id.
    ///
    /// One write transaction covers the whole graph. Entity kinds are
    /// written in referential dependency order (forms before tabs, owners
    /// before bindings) so foreign keys always resolve to rows already
    /// written in the same transaction. Any failure aborts everything.
    pub async fn import_module(&self, transfer: &ModuleTransfer) -> Result<Uuid> {
        if transfer.format != TRANSFER_FORMAT {
            return Err(Error::InvalidInput(format!(
                "Not a module transfer file: format tag '{}'",
                transfer.format
            )));
        }
        // Only login-template defaults may travel in a module transfer;
        // per-login settings never leave their installation.
        if transfer
            .settings
            .iter()
            .any(|s| matches!(s.owner, SettingsOwner::Login(_)))
        {
            return Err(Error::InvalidInput(
                "Module transfer may not carry per-login settings".to_string(),
            ));
        }

        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut entity_count = 0usize;

        let module_id = self
            .modules
            .set_tx(
                &mut tx,
                SetModuleRequest {
                    id: Some(transfer.module.id),
                    name: transfer.module.name.clone(),
                    description: transfer.module.description.clone(),
                },
            )
            .await?;

        for form in &transfer.forms {
            self.forms
                .set_tx(
                    &mut tx,
                    SetFormRequest {
                        id: Some(form.id),
                        module_id,
                        name: form.name.clone(),
                        captions: None,
                    },
                )
                .await?;
            entity_count += 1;
        }

        for tab in &transfer.tabs {
            let tab = compat::migrate_tab(tab.clone());
            self.tabs
                .set_tx(
                    &mut tx,
                    SetTabRequest {
                        id: Some(tab.id),
                        owner_kind: tab.owner_kind,
                        owner_id: tab.owner_id,
                        name: tab.name,
                        position: tab.position,
                        state: tab.state,
                        content_revision: tab
                            .content_revision
                            .unwrap_or(DEFAULT_CONTENT_REVISION),
                        captions: None,
                    },
                )
                .await?;
            entity_count += 1;
        }

        for article in &transfer.articles {
            let article = compat::migrate_article(article.clone());
            self.articles
                .set_tx(
                    &mut tx,
                    SetArticleRequest {
                        id: Some(article.id),
                        module_id,
                        name: article.name,
                        body: article.body,
                        format: article
                            .format
                            .unwrap_or_else(|| DEFAULT_ARTICLE_FORMAT.to_string()),
                        captions: None,
                    },
                )
                .await?;
            entity_count += 1;
        }

        for binding in &transfer.open_forms {
            let binding = compat::migrate_open_form(binding.clone());
            self.open_forms
                .set_tx(
                    &mut tx,
                    SetOpenFormRequest {
                        id: Some(binding.id),
                        module_id,
                        owner_kind: binding.owner_kind,
                        owner_id: binding.owner_id,
                        context: binding.context,
                        target_form_id: binding.target_form_id,
                        relation_index: binding
                            .relation_index
                            .unwrap_or(DEFAULT_RELATION_INDEX),
                    },
                )
                .await?;
            entity_count += 1;
        }

        // Captions use replace-all-for-entity semantics, so group the flat
        // record list back into one map per entity before writing. The file
        // is the full target state: every captioned entity in the graph gets
        // its map written, and an entity with no entries in the file has its
        // stored captions cleared.
        let mut grouped: HashMap<(EntityKind, Uuid), CaptionMap> = HashMap::new();
        for caption in &transfer.captions {
            grouped
                .entry((caption.owner_kind, caption.owner_id))
                .or_default()
                .insert(caption.field.clone(), caption.text.clone());
        }

        let mut captioned: Vec<(EntityKind, Uuid)> = vec![(EntityKind::Module, module_id)];
        captioned.extend(transfer.forms.iter().map(|f| (EntityKind::Form, f.id)));
        captioned.extend(transfer.tabs.iter().map(|t| (EntityKind::Tab, t.id)));
        captioned.extend(transfer.articles.iter().map(|a| (EntityKind::Article, a.id)));
        for (owner_kind, owner_id) in captioned {
            let map = grouped.remove(&(owner_kind, owner_id)).unwrap_or_default();
            self.captions
                .set_tx(&mut tx, owner_kind, owner_id, &map)
                .await?;
        }
        // Leftover records name entities outside the module graph; writing
        // them surfaces whitelist violations as a hard failure.
        for ((owner_kind, owner_id), map) in &grouped {
            self.captions
                .set_tx(&mut tx, *owner_kind, *owner_id, map)
                .await?;
        }

        for settings in &transfer.settings {
            let settings = compat::migrate_settings(settings.clone());
            self.settings
                .set_tx(&mut tx, settings.owner, settings.prefs)
                .await?;
            entity_count += 1;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "transfer",
            component = "import",
            op = "import_module",
            module_id = %module_id,
            entity_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Module imported"
        );
        Ok(module_id)
    }

    /// Import a transfer file from disk.
    pub async fn import_from_file(&self, path: &Path) -> Result<Uuid> {
        let bytes = tokio::fs::read(path).await.map_err(Error::Io)?;
        let transfer: ModuleTransfer = serde_json::from_slice(&bytes)?;
        self.import_module(&transfer).await
    }
}

fn form_to_record(form: Form) -> FormRecord {
    FormRecord {
        id: form.id,
        name: form.name,
    }
}

fn tab_to_record(tab: Tab) -> TabRecord {
    TabRecord {
        id: tab.id,
        owner_kind: tab.owner_kind,
        owner_id: tab.owner_id,
        name: tab.name,
        position: tab.position,
        state: tab.state,
        content_revision: Some(tab.content_revision),
    }
}

fn article_to_record(article: Article) -> ArticleRecord {
    ArticleRecord {
        id: article.id,
        name: article.name,
        body: article.body,
        format: Some(article.format),
    }
}

fn binding_to_record(binding: OpenFormBinding) -> OpenFormRecord {
    OpenFormRecord {
        id: binding.id,
        owner_kind: binding.owner_kind,
        owner_id: binding.owner_id,
        context: binding.context,
        target_form_id: binding.target_form_id,
        relation_index: Some(binding.relation_index),
    }
}
