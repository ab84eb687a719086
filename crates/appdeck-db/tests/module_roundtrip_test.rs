//! Integration tests for module export/import round-trips.
//!
//! Exporting a module, importing the file, and exporting again must produce
//! an entity-for-entity equal file: identifiers are stable across transfer
//! and never regenerated.
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.
//! Run migrations first: `sqlx migrate run`

use std::collections::HashMap;

use appdeck_db::test_fixtures::DEFAULT_TEST_DATABASE_URL;
use appdeck_db::{
    Database, EntityKind, SetArticleRequest, SetFormRequest, SetModuleRequest,
    SetOpenFormRequest, SetTabRequest,
};
use serde_json::json;
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

/// Build a module with one of everything and return its id.
async fn seed_full_module(db: &Database, name: &str) -> Uuid {
    let mut tx = db.pool.begin().await.expect("begin");

    let module_id = db
        .modules
        .set_tx(
            &mut tx,
            SetModuleRequest {
                id: None,
                name: name.to_string(),
                description: Some("round-trip fixture".to_string()),
            },
        )
        .await
        .expect("create module");

    let form_id = db
        .forms
        .set_tx(
            &mut tx,
            SetFormRequest {
                id: None,
                module_id,
                name: "customer".to_string(),
                captions: Some(HashMap::from([(
                    "title".to_string(),
                    "Customer".to_string(),
                )])),
            },
        )
        .await
        .expect("create form");

    db.tabs
        .set_tx(
            &mut tx,
            SetTabRequest {
                id: None,
                owner_kind: EntityKind::Form,
                owner_id: form_id,
                name: "general".to_string(),
                position: 1,
                state: json!({ "layout": "two-column" }),
                content_revision: 1,
                captions: None,
            },
        )
        .await
        .expect("create tab");

    db.articles
        .set_tx(
            &mut tx,
            SetArticleRequest {
                id: None,
                module_id,
                name: "getting-started".to_string(),
                body: "# Start here".to_string(),
                format: "markdown".to_string(),
                captions: None,
            },
        )
        .await
        .expect("create article");

    db.open_forms
        .set_tx(
            &mut tx,
            SetOpenFormRequest {
                id: None,
                module_id,
                owner_kind: EntityKind::Form,
                owner_id: form_id,
                context: None,
                target_form_id: form_id,
                relation_index: 1,
            },
        )
        .await
        .expect("create binding");

    tx.commit().await.expect("commit seed");
    module_id
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_export_import_export_is_stable() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "roundtrip").await;

    let first = db
        .transfer
        .export_module(module_id)
        .await
        .expect("first export");

    db.transfer
        .import_module(&first)
        .await
        .expect("import exported module");

    let second = db
        .transfer
        .export_module(module_id)
        .await
        .expect("second export");

    // Equal modulo the export timestamp.
    assert_eq!(second.module, first.module);
    assert_eq!(second.forms, first.forms);
    assert_eq!(second.tabs, first.tabs);
    assert_eq!(second.articles, first.articles);
    assert_eq!(second.open_forms, first.open_forms);
    assert_eq!(second.captions, first.captions);

    let mut tx = db.pool.begin().await.expect("begin");
    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_import_into_fresh_installation_preserves_ids() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "fresh-install").await;

    let transfer = db.transfer.export_module(module_id).await.expect("export");

    // Simulate the target installation by wiping the source module first.
    let mut tx = db.pool.begin().await.expect("begin");
    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit wipe");

    let imported_id = db
        .transfer
        .import_module(&transfer)
        .await
        .expect("import into fresh installation");
    assert_eq!(imported_id, module_id);

    let mut tx = db.pool.begin().await.expect("begin");
    let forms = db
        .forms
        .list_tx(&mut tx, module_id)
        .await
        .expect("list forms");
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].id, transfer.forms[0].id);

    let captions = db
        .captions
        .get_all_tx(&mut tx, EntityKind::Form, forms[0].id)
        .await
        .expect("captions");
    assert_eq!(captions.get("title").map(String::as_str), Some("Customer"));

    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_import_clears_absent_captions() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "caption-reconcile").await;

    let mut transfer = db.transfer.export_module(module_id).await.expect("export");
    assert!(!transfer.captions.is_empty());

    // The source removed all captions; the file is the full target state,
    // so importing it must clear what the target still stores.
    transfer.captions.clear();
    db.transfer
        .import_module(&transfer)
        .await
        .expect("import without captions");

    let mut tx = db.pool.begin().await.expect("begin");
    let captions = db
        .captions
        .get_all_tx(&mut tx, EntityKind::Form, transfer.forms[0].id)
        .await
        .expect("captions");
    assert!(captions.is_empty());

    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_delete_module_removes_polymorphic_children() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "delete-subtree").await;

    let mut tx = db.pool.begin().await.expect("begin");
    let forms = db
        .forms
        .list_tx(&mut tx, module_id)
        .await
        .expect("list forms");
    let form_id = forms[0].id;
    let tabs = db
        .tabs
        .list_tx(&mut tx, EntityKind::Form, form_id)
        .await
        .expect("list tabs");
    let tab_id = tabs[0].id;

    // Tabs and captions have no foreign key back to the module, so give the
    // tab a caption and make sure the whole subtree goes with the module.
    db.captions
        .set_tx(
            &mut tx,
            EntityKind::Tab,
            tab_id,
            &HashMap::from([("title".to_string(), "General".to_string())]),
        )
        .await
        .expect("set tab caption");

    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit delete");

    let orphan_tabs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tab WHERE id = $1")
        .bind(tab_id)
        .fetch_one(&db.pool)
        .await
        .expect("count tabs");
    assert_eq!(orphan_tabs, 0);

    let orphan_captions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM caption WHERE owner_id = $1 OR owner_id = $2 OR owner_id = $3",
    )
    .bind(module_id)
    .bind(form_id)
    .bind(tab_id)
    .fetch_one(&db.pool)
    .await
    .expect("count captions");
    assert_eq!(orphan_captions, 0);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_delete_form_removes_tabs_and_bindings() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "delete-form").await;

    let mut tx = db.pool.begin().await.expect("begin");
    let forms = db
        .forms
        .list_tx(&mut tx, module_id)
        .await
        .expect("list forms");
    let form_id = forms[0].id;

    db.forms
        .delete_tx(&mut tx, form_id)
        .await
        .expect("delete form");

    let tabs = db
        .tabs
        .list_tx(&mut tx, EntityKind::Form, form_id)
        .await
        .expect("list tabs");
    assert!(tabs.is_empty());

    let binding = db
        .open_forms
        .get_tx(&mut tx, EntityKind::Form, form_id, None)
        .await
        .expect("get binding");
    assert!(binding.is_none());

    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_export_unknown_module_is_not_found() {
    let db = setup_test_db().await;

    let result = db.transfer.export_module(Uuid::now_v7()).await;
    assert!(matches!(
        result,
        Err(appdeck_db::Error::ModuleNotFound(_))
    ));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_export_to_file_and_import_from_file() {
    let db = setup_test_db().await;
    let module_id = seed_full_module(&db, "file-transfer").await;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = db
        .transfer
        .export_to_file(module_id, dir.path())
        .await
        .expect("export to file");
    assert!(path.exists());

    let imported_id = db
        .transfer
        .import_from_file(&path)
        .await
        .expect("import from file");
    assert_eq!(imported_id, module_id);

    db.transfer.remove_artifact(&path).await;
    assert!(!path.exists());
    // Removing an already-removed artifact only warns.
    db.transfer.remove_artifact(&path).await;

    let mut tx = db.pool.begin().await.expect("begin");
    db.modules
        .delete_tx(&mut tx, module_id)
        .await
        .expect("delete module");
    tx.commit().await.expect("commit cleanup");
}
