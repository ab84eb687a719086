//! Integration tests for importing transfer files written by older
//! platform revisions.
//!
//! The migration engine runs between deserialization and persistence, so a
//! pre-r5 file with missing fields must land on the current schema with the
//! documented defaults filled in.
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.
//! Run migrations first: `sqlx migrate run`

use appdeck_db::defaults::{
    DEFAULT_ARTICLE_FORMAT, DEFAULT_CONTENT_REVISION, DEFAULT_RELATION_INDEX, TRANSFER_FORMAT,
};
use appdeck_db::test_fixtures::DEFAULT_TEST_DATABASE_URL;
use appdeck_db::{Database, EntityKind, ModuleTransfer};
use sqlx::PgPool;
use uuid::Uuid;

async fn setup_test_db() -> Database {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_TEST_DATABASE_URL.to_string());

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    Database::new(pool)
}

/// A file shaped like an r4 export: bare-string tab state, no content
/// revision, no article format, no relation index, `""` default context.
fn old_revision_file(module_id: Uuid, form_id: Uuid) -> String {
    format!(
        r#"{{
            "format": "{TRANSFER_FORMAT}",
            "exported_at": "2020-06-01T00:00:00Z",
            "module": {{"id": "{module_id}", "name": "legacy-crm"}},
            "forms": [{{"id": "{form_id}", "name": "customer"}}],
            "tabs": [{{
                "id": "{tab_id}",
                "owner_kind": "form",
                "owner_id": "{form_id}",
                "name": "general",
                "position": 1,
                "state": "two-column"
            }}],
            "articles": [{{
                "id": "{article_id}",
                "name": "help",
                "body": "How to use the customer form"
            }}],
            "open_forms": [{{
                "id": "{binding_id}",
                "owner_kind": "form",
                "owner_id": "{form_id}",
                "context": "",
                "target_form_id": "{form_id}"
            }}]
        }}"#,
        tab_id = Uuid::now_v7(),
        article_id = Uuid::now_v7(),
        binding_id = Uuid::now_v7(),
    )
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_pre_r5_file_imports_with_documented_defaults() {
    let db = setup_test_db().await;
    let module_id = Uuid::now_v7();
    let form_id = Uuid::now_v7();

    let transfer: ModuleTransfer =
        serde_json::from_str(&old_revision_file(module_id, form_id)).expect("deserialize");
    db.transfer
        .import_module(&transfer)
        .await
        .expect("import old file");

    let mut tx = db.pool.begin().await.expect("begin");

    // Binding gained the documented relation index, not a zero sentinel,
    // and its "" context normalized to the default slot.
    let binding = db
        .open_forms
        .get_tx(&mut tx, EntityKind::Form, form_id, None)
        .await
        .expect("get binding")
        .expect("binding stored under default context");
    assert_eq!(binding.relation_index, DEFAULT_RELATION_INDEX);

    // Bare-string state wrapped into the structured blob, counter filled.
    let tabs = db
        .tabs
        .list_tx(&mut tx, EntityKind::Form, form_id)
        .await
        .expect("list tabs");
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0].state["layout"], "two-column");
    assert_eq!(tabs[0].content_revision, DEFAULT_CONTENT_REVISION);

    // Article format defaulted.
    let articles = db
        .articles
        .list_tx(&mut tx, module_id)
        .await
        .expect("list articles");
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].format, DEFAULT_ARTICLE_FORMAT);

    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_reimporting_old_file_over_current_module_is_stable() {
    let db = setup_test_db().await;
    let module_id = Uuid::now_v7();
    let form_id = Uuid::now_v7();

    let transfer: ModuleTransfer =
        serde_json::from_str(&old_revision_file(module_id, form_id)).expect("deserialize");

    // First import migrates; the second import hits entities already on the
    // current schema and must leave them equivalent (migrations are
    // idempotent end to end).
    db.transfer
        .import_module(&transfer)
        .await
        .expect("first import");
    let exported = db.transfer.export_module(module_id).await.expect("export");

    db.transfer
        .import_module(&transfer)
        .await
        .expect("second import");
    let re_exported = db.transfer.export_module(module_id).await.expect("re-export");

    assert_eq!(re_exported.tabs, exported.tabs);
    assert_eq!(re_exported.articles, exported.articles);
    assert_eq!(re_exported.open_forms, exported.open_forms);

    let mut tx = db.pool.begin().await.expect("begin");
    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}
