//! Compatibility migration engine.
//!
//! A module exported by an older platform revision must import cleanly into
//! a newer schema. Every breaking transfer-format change gets exactly one
//! function here, named after the revision boundary and the field it
//! bridges. The functions are pure, total, and idempotent: they always
//! return a usable value, treat "cannot determine" as "apply the documented
//! default" from [`crate::defaults`], and pass an already-current value
//! through unchanged.
//!
//! Per entity kind the steps compose oldest boundary first, so each step may
//! assume every earlier fix has already run. Adding a fix for a new boundary
//! means appending one step to the kind's pipeline; call sites never change.
//!
//! The `export_*` fixups are the forward direction: they keep emitted files
//! self-describing for the current revision (every current field present,
//! default context emitted as absent rather than `""`).

use serde_json::Value as JsonValue;

use crate::defaults::{
    DEFAULT_ARTICLE_FORMAT, DEFAULT_CONTENT_REVISION, DEFAULT_LOCALE, DEFAULT_RELATION_INDEX,
    TAB_STATE_LAYOUT_KEY,
};
use crate::transfer::{ArticleRecord, OpenFormRecord, SettingsRecord, TabRecord};

// =============================================================================
// OPEN-FORM BINDINGS
// =============================================================================

/// r4 → r5: default the relation-index-to-apply field for bindings exported
/// before it existed. Pre-r5 installations always applied the first relation
/// index, so the default preserves authored intent.
pub fn fill_relation_index(mut record: OpenFormRecord) -> OpenFormRecord {
    if record.relation_index.is_none() {
        record.relation_index = Some(DEFAULT_RELATION_INDEX);
    }
    record
}

/// r5 → r6: normalize the default binding context. Pre-r6 exporters wrote
/// `""` where the current format omits the field; an empty context and no
/// context are the same binding slot.
pub fn normalize_default_context(mut record: OpenFormRecord) -> OpenFormRecord {
    if record.context.as_deref() == Some("") {
        record.context = None;
    }
    record
}

/// Full pipeline for one open-form binding, oldest boundary first.
pub fn migrate_open_form(record: OpenFormRecord) -> OpenFormRecord {
    let record = fill_relation_index(record);
    normalize_default_context(record)
}

/// Forward fixup on export: emitted bindings always carry a relation index
/// and never use `""` for the default context.
pub fn export_open_form(record: OpenFormRecord) -> OpenFormRecord {
    migrate_open_form(record)
}

// =============================================================================
// TABS
// =============================================================================

/// r4 → r5: wrap a bare-string tab state blob into the structured object the
/// current schema stores. Pre-r5 the blob was the layout name itself.
pub fn wrap_tab_state(mut record: TabRecord) -> TabRecord {
    if let JsonValue::String(layout) = record.state {
        record.state = serde_json::json!({ TAB_STATE_LAYOUT_KEY: layout });
    }
    record
}

/// r6 → r7: default the content-revision counter for tabs exported before
/// cache-busting existed.
pub fn fill_content_revision(mut record: TabRecord) -> TabRecord {
    if record.content_revision.is_none() {
        record.content_revision = Some(DEFAULT_CONTENT_REVISION);
    }
    record
}

/// Full pipeline for one tab, oldest boundary first.
pub fn migrate_tab(record: TabRecord) -> TabRecord {
    let record = wrap_tab_state(record);
    fill_content_revision(record)
}

/// Forward fixup on export.
pub fn export_tab(record: TabRecord) -> TabRecord {
    migrate_tab(record)
}

// =============================================================================
// ARTICLES
// =============================================================================

/// r5 → r6: default the markup format for articles exported before the
/// field existed. Pre-r6 installations rendered every article as markdown.
pub fn fill_article_format(mut record: ArticleRecord) -> ArticleRecord {
    if record.format.is_none() {
        record.format = Some(DEFAULT_ARTICLE_FORMAT.to_string());
    }
    record
}

/// Full pipeline for one article.
pub fn migrate_article(record: ArticleRecord) -> ArticleRecord {
    fill_article_format(record)
}

/// Forward fixup on export.
pub fn export_article(record: ArticleRecord) -> ArticleRecord {
    migrate_article(record)
}

// =============================================================================
// SETTINGS
// =============================================================================

/// r6 → r7: default the locale preference for settings exported before it
/// existed. Also coerces a non-object prefs blob (possible in hand-edited
/// pre-r5 files) into an object so downstream persistence never
/// special-cases the shape.
pub fn fill_settings_locale(mut record: SettingsRecord) -> SettingsRecord {
    if !record.prefs.is_object() {
        record.prefs = serde_json::json!({});
    }
    if let Some(prefs) = record.prefs.as_object_mut() {
        prefs
            .entry("locale")
            .or_insert_with(|| JsonValue::String(DEFAULT_LOCALE.to_string()));
    }
    record
}

/// Full pipeline for one settings record.
pub fn migrate_settings(record: SettingsRecord) -> SettingsRecord {
    fill_settings_locale(record)
}

/// Forward fixup on export.
pub fn export_settings(record: SettingsRecord) -> SettingsRecord {
    migrate_settings(record)
}
