use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Tracked products
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS products (
  id TEXT PRIMARY KEY,
  shop TEXT NOT NULL,
  product_code TEXT NOT NULL,
  product_name TEXT NOT NULL,
  image_url TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Per-user target price subscriptions
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS tracking_subscriptions (
  user_id TEXT NOT NULL,
  product_id TEXT NOT NULL,
  target_price BIGINT NOT NULL,
  alert_state TEXT NOT NULL CHECK (alert_state IN ('ARMED','NOTIFIED')),
  alert_enabled BIGINT NOT NULL CHECK (alert_enabled IN (0,1)),
  PRIMARY KEY (user_id, product_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Append-only price time series
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS price_history (
  record_id TEXT PRIMARY KEY,
  product_id TEXT NOT NULL,
  price BIGINT NOT NULL,
  is_sold_out BIGINT NOT NULL CHECK (is_sold_out IN (0,1)),
  observed_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Key/value entries backing the snapshot cache
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS cache_entries (
  cache_key TEXT PRIMARY KEY,
  cache_value TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_subscriptions_product ON tracking_subscriptions(product_id);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_price_history_product ON price_history(product_id, observed_at_ms);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
