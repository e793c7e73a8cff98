use anyhow::Context;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{Any, AnyPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::catalog::model::{AlertState, TrackedProduct, TrackingSubscription};
use crate::catalog::repository::CatalogRepository;
use crate::db::{IN_LIST_CHUNK, bool_to_i64, i64_to_u64, u64_to_i64};

/// SQLx-backed implementation of CatalogRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxCatalogRepository {
    pool: AnyPool,
}

impl SqlxCatalogRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn find_all_products(&self) -> anyhow::Result<Vec<TrackedProduct>> {
        let rows = sqlx::query(
            r#"
SELECT id, shop, product_code, product_name, image_url
FROM products;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_product(&r) {
                Ok(p) => out.push(p),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the cycle
                    tracing::warn!(error = %e, "skipping malformed product row");
                }
            }
        }

        Ok(out)
    }

    async fn save_products(&self, products: &[TrackedProduct]) -> anyhow::Result<()> {
        if products.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for p in products {
            sqlx::query(
                r#"
INSERT INTO products (id, shop, product_code, product_name, image_url)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
  shop = excluded.shop,
  product_code = excluded.product_code,
  product_name = excluded.product_name,
  image_url = excluded.image_url;
"#,
            )
            .bind(p.id.to_string())
            .bind(p.shop.as_str())
            .bind(p.product_code.as_str())
            .bind(p.product_name.as_str())
            .bind(p.image_url.as_str())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to upsert product {}", p.id))?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn update_product_metadata(&self, products: &[TrackedProduct]) -> anyhow::Result<()> {
        if products.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for p in products {
            sqlx::query(
                r#"
UPDATE products
SET product_name = ?, image_url = ?
WHERE id = ?;
"#,
            )
            .bind(p.product_name.as_str())
            .bind(p.image_url.as_str())
            .bind(p.id.to_string())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to update metadata of product {}", p.id))?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn find_subscriptions_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> anyhow::Result<Vec<TrackingSubscription>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(product_ids.len());
        for chunk in product_ids.chunks(IN_LIST_CHUNK) {
            let mut qb: QueryBuilder<Any> = QueryBuilder::new(
                r#"
SELECT user_id, product_id, target_price, alert_state, alert_enabled
FROM tracking_subscriptions
WHERE product_id IN ("#,
            );
            let mut ids = qb.separated(", ");
            for id in chunk {
                ids.push_bind(id.to_string());
            }
            ids.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;

            for r in rows {
                match row_to_subscription(&r) {
                    Ok(s) => out.push(s),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed subscription row");
                    }
                }
            }
        }

        Ok(out)
    }

    async fn save_subscriptions(
        &self,
        subscriptions: &[TrackingSubscription],
    ) -> anyhow::Result<()> {
        if subscriptions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for s in subscriptions {
            sqlx::query(
                r#"
INSERT INTO tracking_subscriptions (user_id, product_id, target_price, alert_state, alert_enabled)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (user_id, product_id) DO UPDATE SET
  target_price = excluded.target_price,
  alert_state = excluded.alert_state,
  alert_enabled = excluded.alert_enabled;
"#,
            )
            .bind(s.user_id.to_string())
            .bind(s.product_id.to_string())
            .bind(u64_to_i64(s.target_price)?)
            .bind(s.state.as_str())
            .bind(bool_to_i64(s.alert_enabled))
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "failed to upsert subscription user={} product={}",
                    s.user_id, s.product_id
                )
            })?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn set_alert_states(&self, updates: &[(Uuid, Uuid, AlertState)]) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (user_id, product_id, state) in updates {
            let res = sqlx::query(
                r#"
UPDATE tracking_subscriptions
SET alert_state = ?
WHERE user_id = ? AND product_id = ?;
"#,
            )
            .bind(state.as_str())
            .bind(user_id.to_string())
            .bind(product_id.to_string())
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("failed to set alert state user={user_id} product={product_id}")
            })?;

            if res.rows_affected() == 0 {
                tracing::debug!(%user_id, %product_id, "subscription gone; alert state not written");
            }
        }
        tx.commit().await?;

        Ok(())
    }
}

/* =========================
Row mapping
========================= */

fn row_to_product(r: &AnyRow) -> anyhow::Result<TrackedProduct> {
    let id_str: String = r.try_get("id")?;
    let id = Uuid::parse_str(&id_str).context("invalid product id")?;

    Ok(TrackedProduct {
        id,
        shop: r.try_get("shop")?,
        product_code: r.try_get("product_code")?,
        product_name: r.try_get("product_name")?,
        image_url: r.try_get("image_url")?,
    })
}

fn row_to_subscription(r: &AnyRow) -> anyhow::Result<TrackingSubscription> {
    let user_id = Uuid::parse_str(&r.try_get::<String, _>("user_id")?).context("invalid user_id")?;
    let product_id =
        Uuid::parse_str(&r.try_get::<String, _>("product_id")?).context("invalid product_id")?;
    let alert_enabled: i64 = r.try_get("alert_enabled")?;

    Ok(TrackingSubscription {
        user_id,
        product_id,
        target_price: i64_to_u64(r.try_get("target_price")?)?,
        state: r.try_get::<String, _>("alert_state")?.parse()?,
        alert_enabled: alert_enabled == 1,
    })
}
