//! Centralized default constants for appdeck.
//!
//! **This module is the single source of truth** for shared default values,
//! in particular the documented defaults the compatibility migration engine
//! fills into transfer files written by older platform revisions. Migration
//! steps must reference these constants instead of inline literals.

// =============================================================================
// TRANSFER FORMAT
// =============================================================================

/// Identifier tag written into every transfer file.
pub const TRANSFER_FORMAT: &str = "appdeck-module-transfer";

/// Current transfer format revision. Versioning of files is implicit (absent
/// fields mark older revisions); this constant only documents the revision
/// the export path produces.
pub const TRANSFER_REVISION: u32 = 7;

// =============================================================================
// MIGRATION DEFAULTS
// =============================================================================

/// Relation index applied by an open-form binding exported before r5
/// introduced the field. 1 selects the first relation index, which is what
/// every pre-r5 installation did unconditionally.
pub const DEFAULT_RELATION_INDEX: i32 = 1;

/// Content revision for tabs exported before r7 added cache-busting
/// counters. Counters start at 1 so a fresh import still busts any stale
/// zero-revision cache entry.
pub const DEFAULT_CONTENT_REVISION: i32 = 1;

/// Markup format for articles exported before r6 recorded one. Pre-r6
/// installations rendered all help articles as markdown.
pub const DEFAULT_ARTICLE_FORMAT: &str = "markdown";

/// Locale preference for settings exported before r7 carried one.
pub const DEFAULT_LOCALE: &str = "en";

/// Key under which a pre-r5 bare-string tab state blob is wrapped.
pub const TAB_STATE_LAYOUT_KEY: &str = "layout";
