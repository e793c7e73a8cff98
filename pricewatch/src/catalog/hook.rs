use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::catalog::model::TrackedProduct;

/// Downstream index/cache that mirrors product metadata and must hear about drift.
#[async_trait]
pub trait MetadataHook: Send + Sync {
    async fn on_products_metadata_changed(&self, products: &[TrackedProduct]) -> Result<()>;
}

/// Records refreshed products in the log; used when no downstream index is deployed.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMetadataHook;

#[async_trait]
impl MetadataHook for LogMetadataHook {
    async fn on_products_metadata_changed(&self, products: &[TrackedProduct]) -> Result<()> {
        for p in products {
            info!(
                product_id = %p.id,
                shop = %p.shop,
                product_name = %p.product_name,
                "product metadata refreshed"
            );
        }
        Ok(())
    }
}
