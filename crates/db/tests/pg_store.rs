//! Integration tests for `PgConfigStore` against a real database.
//!
//! Require `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use doshboard_core::widget::{NewWidget, WidgetType};
use doshboard_db::{ConfigChange, ConfigStore, PgConfigStore, StoreError};
use sqlx::PgPool;

fn weather_widget(owner_id: i64, city: &str) -> NewWidget {
    NewWidget {
        owner_id,
        widget_type: WidgetType::Weather,
        params: BTreeMap::from([("city".to_string(), city.to_string())]),
        refresh_interval_secs: 600,
    }
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn create_load_update_delete(pool: PgPool) {
    let store = PgConfigStore::new(pool);
    let mut changes = store.subscribe_changes();

    let mut cfg = store.create(weather_widget(1, "Lyon")).await.unwrap();
    assert_eq!(changes.recv().await.unwrap(), ConfigChange::Upserted(cfg.clone()));
    assert_eq!(store.load(cfg.widget_id).await.unwrap(), cfg);

    cfg.params.insert("city".into(), "Nantes".into());
    cfg.refresh_interval_secs = 900;
    store.save(&cfg).await.unwrap();
    let reloaded = store.load(cfg.widget_id).await.unwrap();
    assert_eq!(reloaded.param("city"), Some("Nantes"));
    assert_eq!(reloaded.refresh_interval_secs, 900);

    store.delete(cfg.widget_id).await.unwrap();
    assert_matches!(store.load(cfg.widget_id).await, Err(StoreError::NotFound(_)));
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn list_for_owner_only_returns_owned_widgets(pool: PgPool) {
    let store = PgConfigStore::new(pool);
    store.create(weather_widget(1, "Lyon")).await.unwrap();
    store.create(weather_widget(2, "Lille")).await.unwrap();

    let owned = store.list_for_owner(1).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].param("city"), Some("Lyon"));
    assert_eq!(store.list_all().await.unwrap().len(), 2);
    assert!(store.health_check().await);
}
