use uuid::Uuid;

use crate::catalog::model::TrackedProduct;
use crate::fetch::gateway::FetchedProduct;

/// Fresh state of one product for one cycle. Never persisted as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceObservation {
    pub product_id: Uuid,
    pub product_price: u64,
    pub is_sold_out: bool,
    pub product_name: String,
    pub image_url: String,
    pub shop: String,
    pub product_code: String,
}

impl PriceObservation {
    pub fn new(product: &TrackedProduct, fetched: FetchedProduct) -> Self {
        Self {
            product_id: product.id,
            product_price: fetched.price,
            is_sold_out: fetched.is_sold_out,
            product_name: fetched.name,
            image_url: fetched.image_url,
            shop: product.shop.clone(),
            product_code: product.product_code.clone(),
        }
    }
}

/// Outcome of one completed cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Products loaded from the catalog.
    pub tracked: usize,
    /// Products fetched successfully.
    pub fetched: usize,
    pub fetch_failures: usize,
    /// Products whose price or sold-out flag differed from the snapshot.
    pub changed: usize,
    /// False when history for changed products could not be persisted.
    pub history_written: bool,
    pub candidates: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub rearmed: usize,
    pub metadata_updated: usize,
}
