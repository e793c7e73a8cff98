
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use fakes::{RecordingHook, ScriptedGateway, ScriptedPush};
use pricewatch::catalog::{
    AlertState, CatalogRepository, SqlxCatalogRepository, TrackedProduct, TrackingSubscription,
};
use pricewatch::config::EngineConfig;
use pricewatch::db::schema;
use pricewatch::history::{HistoryStore, PriceHistoryRecord, SqlxHistoryStore};
use pricewatch::metrics::counters::Counters;
use pricewatch::reconcile::{EngineDeps, ReconciliationEngine};
use pricewatch::snapshot::{KeyValueCache, SnapshotCache, SqlxKeyValueCache, token_key};

/// Isolated in-memory SQLite database per test.
///
/// One connection keeps writers serialized on the shared-cache database.
async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();
    pool
}

fn product(code: &str) -> TrackedProduct {
    TrackedProduct {
        id: Uuid::new_v4(),
        shop: "SMARTSTORE".into(),
        product_code: code.into(),
        product_name: format!("Product {code}"),
        image_url: format!("https://img.example/{code}.png"),
    }
}

fn subscription(product_id: Uuid, target_price: u64) -> TrackingSubscription {
    TrackingSubscription {
        user_id: Uuid::new_v4(),
        product_id,
        target_price,
        state: AlertState::Armed,
        alert_enabled: true,
    }
}

async fn count(pool: &AnyPool, table: &str) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table};"))
        .fetch_one(pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap()
}

#[tokio::test]
async fn products_round_trip_and_upsert() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let mut a = product("A");
    let b = product("B");
    repo.save_products(&[a.clone(), b.clone()]).await.unwrap();

    a.product_name = "Renamed".into();
    a.image_url = "https://img.example/A-v2.png".into();
    repo.save_products(std::slice::from_ref(&a)).await.unwrap();

    let mut all = repo.find_all_products().await.unwrap();
    all.sort_by(|x, y| x.product_code.cmp(&y.product_code));

    assert_eq!(all, vec![a, b]);
    assert_eq!(count(&pool, "products").await, 2);
}

#[tokio::test]
async fn malformed_product_rows_are_skipped() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let good = product("A");
    repo.save_products(std::slice::from_ref(&good)).await.unwrap();

    sqlx::query(
        r#"INSERT INTO products VALUES ('not-a-uuid', 'SMARTSTORE', 'X', 'Broken', 'https://img.example/x.png')"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let all = repo.find_all_products().await.unwrap();
    assert_eq!(all, vec![good]);
}

#[tokio::test]
async fn subscriptions_are_filtered_by_product() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    let p3 = Uuid::new_v4();

    let s1 = subscription(p1, 100);
    let s2 = subscription(p2, 200);
    let s3 = subscription(p3, 300);
    repo.save_subscriptions(&[s1.clone(), s2.clone(), s3]).await.unwrap();

    let mut found = repo.find_subscriptions_by_product_ids(&[p1, p2]).await.unwrap();
    found.sort_by_key(|s| s.target_price);

    assert_eq!(found, vec![s1, s2]);
    assert!(repo.find_subscriptions_by_product_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn subscription_state_upsert_overwrites() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let p = Uuid::new_v4();
    let mut s = subscription(p, 1_000);
    repo.save_subscriptions(std::slice::from_ref(&s)).await.unwrap();

    s.mark_notified();
    s.alert_enabled = false;
    repo.save_subscriptions(std::slice::from_ref(&s)).await.unwrap();

    let found = repo.find_subscriptions_by_product_ids(&[p]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].state, AlertState::Notified);
    assert!(!found[0].alert_enabled);

    let raw: String = sqlx::query("SELECT alert_state FROM tracking_subscriptions;")
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("alert_state")
        .unwrap();
    assert_eq!(raw, "NOTIFIED");
}

#[tokio::test]
async fn malformed_subscription_rows_are_skipped() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let p = Uuid::new_v4();
    let good = subscription(p, 500);
    repo.save_subscriptions(std::slice::from_ref(&good)).await.unwrap();

    sqlx::query(r#"INSERT INTO tracking_subscriptions VALUES ('garbage', ?, 500, 'ARMED', 1)"#)
        .bind(p.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let found = repo.find_subscriptions_by_product_ids(&[p]).await.unwrap();
    assert_eq!(found, vec![good]);
}

#[tokio::test]
async fn alert_state_write_leaves_user_columns_alone() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let p = Uuid::new_v4();
    let s = subscription(p, 100);
    repo.save_subscriptions(std::slice::from_ref(&s)).await.unwrap();

    // user edits the subscription while a cycle holds an older copy
    sqlx::query(
        "UPDATE tracking_subscriptions SET target_price = 50, alert_enabled = 0 WHERE user_id = ?;",
    )
    .bind(s.user_id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    repo.set_alert_states(&[(s.user_id, p, AlertState::Notified)])
        .await
        .unwrap();

    let found = repo.find_subscriptions_by_product_ids(&[p]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].state, AlertState::Notified);
    assert_eq!(found[0].target_price, 50);
    assert!(!found[0].alert_enabled);
}

#[tokio::test]
async fn alert_state_write_does_not_recreate_deleted_subscription() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let p = Uuid::new_v4();
    let s = subscription(p, 100);
    repo.save_subscriptions(std::slice::from_ref(&s)).await.unwrap();

    sqlx::query("DELETE FROM tracking_subscriptions;")
        .execute(&pool)
        .await
        .unwrap();

    repo.set_alert_states(&[(s.user_id, p, AlertState::Armed)])
        .await
        .unwrap();

    assert_eq!(count(&pool, "tracking_subscriptions").await, 0);
}

#[tokio::test]
async fn metadata_update_only_touches_name_and_image() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let mut kept = product("A");
    let deleted = product("B");
    repo.save_products(&[kept.clone(), deleted.clone()]).await.unwrap();

    sqlx::query("UPDATE products SET shop = 'COUPANG' WHERE id = ?;")
        .bind(kept.id.to_string())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM products WHERE id = ?;")
        .bind(deleted.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    kept.product_name = "Renamed".into();
    let mut stale_deleted = deleted.clone();
    stale_deleted.product_name = "Ghost".into();
    repo.update_product_metadata(&[kept.clone(), stale_deleted])
        .await
        .unwrap();

    let all = repo.find_all_products().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, kept.id);
    assert_eq!(all[0].product_name, "Renamed");
    assert_eq!(all[0].shop, "COUPANG");
}

#[tokio::test]
async fn large_subscription_lookup_spans_several_statements() {
    let pool = setup_db().await;
    let repo = SqlxCatalogRepository::new(pool.clone());

    let subs: Vec<TrackingSubscription> = (0..1_201u64)
        .map(|i| subscription(Uuid::new_v4(), 1_000 + i))
        .collect();
    repo.save_subscriptions(&subs).await.unwrap();

    let ids: Vec<Uuid> = subs.iter().map(|s| s.product_id).collect();
    let found = repo.find_subscriptions_by_product_ids(&ids).await.unwrap();

    assert_eq!(found.len(), 1_201);
}

#[tokio::test]
async fn history_batches_are_appended() {
    let pool = setup_db().await;
    let store = SqlxHistoryStore::new(pool.clone());

    let product_id = Uuid::new_v4();
    let observed_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

    // crosses the per-statement chunk boundary
    let records: Vec<PriceHistoryRecord> = (0..1_234u64)
        .map(|i| PriceHistoryRecord {
            product_id,
            price: 10_000 + i,
            is_sold_out: i % 7 == 0,
            observed_at,
        })
        .collect();

    store.insert_many(&records).await.unwrap();
    store.insert_many(&records[..3]).await.unwrap();
    store.insert_many(&[]).await.unwrap();

    assert_eq!(count(&pool, "price_history").await, 1_237);

    let row = sqlx::query(
        "SELECT price, is_sold_out, observed_at_ms FROM price_history WHERE price = 10000 LIMIT 1;",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.try_get::<i64, _>("is_sold_out").unwrap(), 1);
    assert_eq!(
        row.try_get::<i64, _>("observed_at_ms").unwrap(),
        1_700_000_000_000
    );
}

#[tokio::test]
async fn cache_entries_multi_get_is_positional() {
    let pool = setup_db().await;
    let kv = SqlxKeyValueCache::new(pool.clone());

    kv.set("a", "1".into()).await.unwrap();
    kv.set("c", "3".into()).await.unwrap();
    kv.set("a", "one".into()).await.unwrap();

    let keys = vec!["c".to_string(), "b".to_string(), "a".to_string()];
    let got = kv.multi_get(&keys).await.unwrap();

    assert_eq!(got, vec![Some("3".into()), None, Some("one".into())]);
    assert_eq!(kv.get("b").await.unwrap(), None);
    assert!(kv.multi_get(&[]).await.unwrap().is_empty());
    assert_eq!(count(&pool, "cache_entries").await, 2);
}

#[tokio::test]
async fn large_multi_get_stays_positional() {
    let pool = setup_db().await;
    let kv = SqlxKeyValueCache::new(pool.clone());

    let mut keys = Vec::new();
    for i in 0..1_201 {
        let key = format!("product:{i}");
        if i % 2 == 0 {
            kv.set(&key, i.to_string()).await.unwrap();
        }
        keys.push(key);
    }

    let got = kv.multi_get(&keys).await.unwrap();

    assert_eq!(got.len(), 1_201);
    for (i, value) in got.iter().enumerate() {
        let expected = (i % 2 == 0).then(|| i.to_string());
        assert_eq!(value, &expected, "key {i}");
    }
}

#[tokio::test]
async fn cycle_persists_through_sql_adapters() {
    let pool = setup_db().await;

    let catalog = Arc::new(SqlxCatalogRepository::new(pool.clone()));
    let kv = Arc::new(SqlxKeyValueCache::new(pool.clone()));
    let gateway = Arc::new(ScriptedGateway::default());
    let push = Arc::new(ScriptedPush::default());

    let p = product("A");
    catalog.save_products(std::slice::from_ref(&p)).await.unwrap();
    gateway.set("A", 9_900, false, &p.product_name);

    let sub = subscription(p.id, 10_000);
    catalog.save_subscriptions(std::slice::from_ref(&sub)).await.unwrap();
    kv.set(&token_key(&sub.user_id), "device-1".into()).await.unwrap();

    let cache = SnapshotCache::new(kv.clone());
    let engine = ReconciliationEngine::new(
        EngineDeps {
            catalog: catalog.clone(),
            gateway: gateway.clone(),
            cache: cache.clone(),
            history: Arc::new(SqlxHistoryStore::new(pool.clone())),
            push: push.clone(),
            metadata_hook: Arc::new(RecordingHook::default()),
        },
        EngineConfig::default(),
        Counters::default(),
    );

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.changed, 1);
    assert!(report.history_written);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(push.attempts_for("device-1"), 1);

    let stored = catalog.find_subscriptions_by_product_ids(&[p.id]).await.unwrap();
    assert_eq!(stored[0].state, AlertState::Notified);
    assert_eq!(count(&pool, "price_history").await, 1);

    let snap = cache.load_snapshots(&[p.id]).await.unwrap();
    assert_eq!(snap[0].map(|s| s.lowest_price), Some(9_900));

    // second pass sees no change and writes nothing
    let again = engine.run_cycle().await.unwrap();
    assert_eq!(again.changed, 0);
    assert_eq!(count(&pool, "price_history").await, 1);
}
