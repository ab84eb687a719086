//! Structured logging field name constants for appdeck.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-entity iteration during transfer |

/// Subsystem originating the log event.
/// Values: "db", "transfer"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "export", "import", "open_forms"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "export_module", "import_module", "set", "delete"
pub const OPERATION: &str = "op";

/// Module UUID being transferred.
pub const MODULE_ID: &str = "module_id";

/// Entity kind discriminator ("form", "tab", "article", ...).
pub const ENTITY_KIND: &str = "entity_kind";

/// Entity UUID being operated on.
pub const ENTITY_ID: &str = "entity_id";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of entities written or read by a transfer pass.
pub const ENTITY_COUNT: &str = "entity_count";
