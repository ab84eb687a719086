//! Core data models for appdeck.
//!
//! These types are shared across all appdeck crates and represent the
//! entities of one application module: forms, tabs, help articles, open-form
//! bindings, captions, and display settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// Kinds of entities that can own child records (tabs, open-form bindings)
/// or carry captions.
///
/// Each kind carries its storage discriminator as static metadata, and the
/// per-operation whitelists live here rather than at the call sites. The
/// store dispatches on this enum instead of splicing owner-column names into
/// SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Form,
    Field,
    Relation,
    Tab,
    Article,
}

impl EntityKind {
    /// All kinds, in a stable order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Module,
        EntityKind::Form,
        EntityKind::Field,
        EntityKind::Relation,
        EntityKind::Tab,
        EntityKind::Article,
    ];

    /// Storage/wire discriminator for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Module => "module",
            EntityKind::Form => "form",
            EntityKind::Field => "field",
            EntityKind::Relation => "relation",
            EntityKind::Tab => "tab",
            EntityKind::Article => "article",
        }
    }

    /// Parse a storage discriminator back into a kind.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "module" => Ok(EntityKind::Module),
            "form" => Ok(EntityKind::Form),
            "field" => Ok(EntityKind::Field),
            "relation" => Ok(EntityKind::Relation),
            "tab" => Ok(EntityKind::Tab),
            "article" => Ok(EntityKind::Article),
            other => Err(Error::InvalidInput(format!(
                "Unknown entity kind: {}",
                other
            ))),
        }
    }

    /// Kinds that may own tabs. Tabs render inside modules and forms only.
    pub fn supports_tabs(&self) -> bool {
        matches!(self, EntityKind::Module | EntityKind::Form)
    }

    /// Kinds that may carry open-form bindings: the entities a user can
    /// activate to open another form.
    pub fn supports_open_forms(&self) -> bool {
        matches!(
            self,
            EntityKind::Form | EntityKind::Field | EntityKind::Relation
        )
    }

    /// Kinds that may carry localized captions.
    pub fn supports_captions(&self) -> bool {
        !matches!(self, EntityKind::Field | EntityKind::Relation)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MODULE
// =============================================================================

/// Top-level container for one transferable unit of application schema.
///
/// The id is stable: export and import never regenerate it, so re-importing
/// a module updates the existing installation in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppModule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// FORM
// =============================================================================

/// A form owned by a module. Parent of tabs and owner of open-form bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// TAB
// =============================================================================

/// Ordered child of a module or form.
///
/// `position` is load-bearing: tabs render in ascending position order.
/// `state` is a free-form layout blob; `content_revision` is bumped whenever
/// embedded content changes so clients can cache-bust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: Uuid,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub name: String,
    pub position: i32,
    pub state: JsonValue,
    pub content_revision: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ARTICLE
// =============================================================================

/// Help article attached to a module. Listed by name, ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub body: String,
    /// Markup format of `body` ("markdown", "html").
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// OPEN-FORM BINDING
// =============================================================================

/// Associates a source entity (form, field, relation) with the form that
/// opens when it is activated, optionally scoped by a context string.
///
/// NULL context is the default context. At most one binding exists per
/// (owner_kind, owner_id, context); the store enforces this with
/// delete-then-insert rather than a unique-violation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFormBinding {
    pub id: Uuid,
    pub module_id: Uuid,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub context: Option<String>,
    pub target_form_id: Uuid,
    /// Which relation index of the owner the binding applies to.
    pub relation_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Owner of a settings record: a concrete login or a login template,
/// never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum SettingsOwner {
    Login(Uuid),
    LoginTemplate(Uuid),
}

impl SettingsOwner {
    /// Reconstruct an owner from the raw column pair, enforcing the
    /// exactly-one invariant. Both-set and neither-set are validation
    /// errors, checked on every read and write.
    pub fn from_columns(login_id: Option<Uuid>, login_template_id: Option<Uuid>) -> Result<Self> {
        match (login_id, login_template_id) {
            (Some(login), None) => Ok(SettingsOwner::Login(login)),
            (None, Some(template)) => Ok(SettingsOwner::LoginTemplate(template)),
            (Some(_), Some(_)) => Err(Error::InvalidInput(
                "Settings attached to both a login and a login template".to_string(),
            )),
            (None, None) => Err(Error::InvalidInput(
                "Settings attached to neither a login nor a login template".to_string(),
            )),
        }
    }

    /// Split back into the raw column pair for persistence.
    pub fn into_columns(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            SettingsOwner::Login(id) => (Some(id), None),
            SettingsOwner::LoginTemplate(id) => (None, Some(id)),
        }
    }
}

/// Global display/behavior preference set for one login or login template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub id: Uuid,
    pub owner: SettingsOwner,
    pub prefs: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_entity_kind_parse_unknown() {
        let err = EntityKind::parse("widget").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_tab_owner_whitelist() {
        assert!(EntityKind::Module.supports_tabs());
        assert!(EntityKind::Form.supports_tabs());
        assert!(!EntityKind::Field.supports_tabs());
        assert!(!EntityKind::Article.supports_tabs());
    }

    #[test]
    fn test_open_form_owner_whitelist() {
        assert!(EntityKind::Form.supports_open_forms());
        assert!(EntityKind::Field.supports_open_forms());
        assert!(EntityKind::Relation.supports_open_forms());
        assert!(!EntityKind::Module.supports_open_forms());
        assert!(!EntityKind::Tab.supports_open_forms());
    }

    #[test]
    fn test_settings_owner_exactly_one() {
        let login = Uuid::new_v4();
        let template = Uuid::new_v4();

        assert_eq!(
            SettingsOwner::from_columns(Some(login), None).unwrap(),
            SettingsOwner::Login(login)
        );
        assert_eq!(
            SettingsOwner::from_columns(None, Some(template)).unwrap(),
            SettingsOwner::LoginTemplate(template)
        );

        let both = SettingsOwner::from_columns(Some(login), Some(template));
        assert!(matches!(both, Err(Error::InvalidInput(_))));

        let neither = SettingsOwner::from_columns(None, None);
        assert!(matches!(neither, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_settings_owner_columns_roundtrip() {
        let owner = SettingsOwner::Login(Uuid::new_v4());
        let (login, template) = owner.into_columns();
        assert_eq!(SettingsOwner::from_columns(login, template).unwrap(), owner);
    }

    #[test]
    fn test_entity_kind_serde_snake_case() {
        let json = serde_json::to_string(&EntityKind::Form).unwrap();
        assert_eq!(json, "\"form\"");
        let kind: EntityKind = serde_json::from_str("\"relation\"").unwrap();
        assert_eq!(kind, EntityKind::Relation);
    }
}
