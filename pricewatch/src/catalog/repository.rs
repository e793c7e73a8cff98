use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::model::{AlertState, TrackedProduct, TrackingSubscription};

/// Durable store of tracked products and their subscriptions.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_all_products(&self) -> Result<Vec<TrackedProduct>>;

    /// Upserts products by id.
    async fn save_products(&self, products: &[TrackedProduct]) -> Result<()>;

    /// Overwrites only name and image of products that still exist.
    async fn update_product_metadata(&self, products: &[TrackedProduct]) -> Result<()>;

    /// All subscriptions whose product is in `product_ids`, in one query.
    async fn find_subscriptions_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<TrackingSubscription>>;

    /// Upserts subscriptions by (user_id, product_id).
    async fn save_subscriptions(&self, subscriptions: &[TrackingSubscription]) -> Result<()>;

    /// Sets `alert_state` for each `(user_id, product_id, state)`.
    ///
    /// Every other column is left as stored; a subscription deleted in the
    /// meantime is not recreated.
    async fn set_alert_states(&self, updates: &[(Uuid, Uuid, AlertState)]) -> Result<()>;
}
