use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::logger::warn_if_slow;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::snapshot::model::{SnapshotEntry, product_key, token_key};
use crate::snapshot::port::KeyValueCache;

/// Typed view over the shared key/value cache.
#[derive(Clone)]
pub struct SnapshotCache {
    kv: Arc<dyn KeyValueCache>,
}

impl SnapshotCache {
    pub fn new(kv: Arc<dyn KeyValueCache>) -> Self {
        Self { kv }
    }

    /// Loads the cached entries for `product_ids` in one multi-get.
    ///
    /// The result is positionally aligned with `product_ids`. A value that
    /// does not decode is reported as a miss, so the product is re-snapshotted.
    #[instrument(skip_all, target = "cache", fields(count = product_ids.len()))]
    pub async fn load_snapshots(&self, product_ids: &[Uuid]) -> Result<Vec<Option<SnapshotEntry>>> {
        let keys: Vec<String> = product_ids.iter().map(product_key).collect();

        let raw = warn_if_slow("cache_multi_get", Duration::from_millis(100), async {
            self.kv.multi_get(&keys).await
        })
        .await
        .context("snapshot multi-get failed")?;

        if raw.len() != keys.len() {
            anyhow::bail!(
                "multi-get returned {} values for {} keys",
                raw.len(),
                keys.len()
            );
        }

        let entries = raw
            .into_iter()
            .zip(&keys)
            .map(|(value, key)| {
                let value = value?;
                match serde_json::from_str::<SnapshotEntry>(&value) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(%key, error = %e, "undecodable snapshot treated as miss");
                        None
                    }
                }
            })
            .collect();

        Ok(entries)
    }

    pub async fn store_snapshot(&self, product_id: &Uuid, entry: &SnapshotEntry) -> Result<()> {
        let value = serde_json::to_string(entry).context("encode snapshot")?;

        self.kv
            .set(&product_key(product_id), value)
            .await
            .with_context(|| format!("snapshot write failed for product {product_id}"))?;

        debug!(%product_id, price = entry.price, lowest = entry.lowest_price, "snapshot stored");
        Ok(())
    }

    /// Device push token registered for `user_id`, if any.
    pub async fn push_token(&self, user_id: &Uuid) -> Result<Option<String>> {
        let token = self
            .kv
            .get(&token_key(user_id))
            .await
            .with_context(|| format!("push token lookup failed for user {user_id}"))?;

        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Lowest price ever observed for a product since it was first cached.
    pub async fn lowest_price(&self, product_id: &Uuid) -> Result<Option<u64>> {
        let entries = self.load_snapshots(std::slice::from_ref(product_id)).await?;
        Ok(entries.into_iter().next().flatten().map(|e| e.lowest_price))
    }
}
