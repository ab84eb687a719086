//! # appdeck-core
//!
//! Core types and abstractions for the appdeck module transfer subsystem.
//!
//! This crate provides:
//! - Domain models for module entities (forms, tabs, articles, open-form
//!   bindings, captions, settings)
//! - The transfer file format ([`transfer::ModuleTransfer`])
//! - The compatibility migration engine ([`compat`]) that reconciles
//!   transfer files written by older platform revisions
//! - Shared error types, logging field constants, and default values

pub mod compat;
pub mod defaults;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod transfer;

pub use error::{Error, Result};
pub use ids::{new_v7, resolve_id};
pub use models::{
    AppModule, Article, EntityKind, Form, OpenFormBinding, Settings, SettingsOwner, Tab,
};
pub use transfer::{
    ArticleRecord, CaptionRecord, FormRecord, ModuleRecord, ModuleTransfer, OpenFormRecord,
    SettingsRecord, TabRecord,
};
