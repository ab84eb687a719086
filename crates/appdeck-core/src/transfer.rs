//! Transfer file format for module export/import.
//!
//! A transfer file is the self-contained serialized graph of one module:
//! module metadata, forms, tabs, articles, open-form bindings, captions, and
//! optional settings defaults. Files are versioned implicitly: every field
//! added after format revision r4 is `Option` here, and the compatibility
//! migration engine ([`crate::compat`]) fills the documented default when a
//! field is absent. A file produced by the current exporter always carries
//! every field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{EntityKind, SettingsOwner};

/// Complete serialized entity graph of one module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleTransfer {
    /// Format tag, always [`crate::defaults::TRANSFER_FORMAT`].
    pub format: String,
    pub exported_at: DateTime<Utc>,
    pub module: ModuleRecord,
    #[serde(default)]
    pub forms: Vec<FormRecord>,
    #[serde(default)]
    pub tabs: Vec<TabRecord>,
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
    #[serde(default)]
    pub open_forms: Vec<OpenFormRecord>,
    #[serde(default)]
    pub captions: Vec<CaptionRecord>,
    /// Login-template settings defaults shipped with the module, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<SettingsRecord>,
}

/// Module metadata section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One exported form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormRecord {
    pub id: Uuid,
    pub name: String,
}

/// One exported tab.
///
/// `state` was a bare string before r5 and an object after; `content_revision`
/// exists only from r7 on. Both differences are reconciled by the migration
/// engine before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabRecord {
    pub id: Uuid,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub name: String,
    pub position: i32,
    #[serde(default)]
    pub state: JsonValue,
    #[serde(default)]
    pub content_revision: Option<i32>,
}

/// One exported help article. `format` exists from r6 on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// One exported open-form binding. `relation_index` exists from r5 on;
/// pre-r6 exporters wrote the default context as `""` instead of omitting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenFormRecord {
    pub id: Uuid,
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    #[serde(default)]
    pub context: Option<String>,
    pub target_form_id: Uuid,
    #[serde(default)]
    pub relation_index: Option<i32>,
}

/// One localized caption: (entity kind, entity id, field) → text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionRecord {
    pub owner_kind: EntityKind,
    pub owner_id: Uuid,
    pub field: String,
    pub text: String,
}

/// Login-template settings defaults. Per-login settings never travel in a
/// module transfer; `prefs.locale` exists from r7 on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsRecord {
    pub owner: SettingsOwner,
    #[serde(default)]
    pub prefs: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::TRANSFER_FORMAT;

    #[test]
    fn test_old_file_without_optional_fields_deserializes() {
        // Shaped like an r4 export: no relation_index, no content_revision,
        // no article format, bare-string tab state.
        let json = format!(
            r#"{{
                "format": "{TRANSFER_FORMAT}",
                "exported_at": "2021-03-01T00:00:00Z",
                "module": {{"id": "018f0000-0000-7000-8000-000000000001", "name": "crm"}},
                "forms": [{{"id": "018f0000-0000-7000-8000-000000000002", "name": "customer"}}],
                "tabs": [{{
                    "id": "018f0000-0000-7000-8000-000000000003",
                    "owner_kind": "form",
                    "owner_id": "018f0000-0000-7000-8000-000000000002",
                    "name": "general",
                    "position": 1,
                    "state": "two-column"
                }}],
                "open_forms": [{{
                    "id": "018f0000-0000-7000-8000-000000000004",
                    "owner_kind": "form",
                    "owner_id": "018f0000-0000-7000-8000-000000000002",
                    "target_form_id": "018f0000-0000-7000-8000-000000000002"
                }}]
            }}"#
        );

        let transfer: ModuleTransfer = serde_json::from_str(&json).unwrap();
        assert_eq!(transfer.module.name, "crm");
        assert_eq!(transfer.open_forms[0].relation_index, None);
        assert_eq!(transfer.tabs[0].content_revision, None);
        assert!(transfer.tabs[0].state.is_string());
        assert!(transfer.articles.is_empty());
        assert!(transfer.settings.is_empty());
    }

    #[test]
    fn test_current_file_roundtrips() {
        let transfer = ModuleTransfer {
            format: TRANSFER_FORMAT.to_string(),
            exported_at: Utc::now(),
            module: ModuleRecord {
                id: Uuid::now_v7(),
                name: "inventory".to_string(),
                description: Some("stock tracking".to_string()),
            },
            forms: vec![],
            tabs: vec![],
            articles: vec![ArticleRecord {
                id: Uuid::now_v7(),
                name: "getting-started".to_string(),
                body: "# Start here".to_string(),
                format: Some("markdown".to_string()),
            }],
            open_forms: vec![],
            captions: vec![CaptionRecord {
                owner_kind: EntityKind::Article,
                owner_id: Uuid::now_v7(),
                field: "title".to_string(),
                text: "Getting started".to_string(),
            }],
            settings: vec![],
        };

        let json = serde_json::to_string(&transfer).unwrap();
        let back: ModuleTransfer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, transfer);
    }
}
