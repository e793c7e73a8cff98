pub mod store;
pub mod store_sqlx;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use store::HistoryStore;
pub use store_sqlx::SqlxHistoryStore;

/// One point of a product's price time series. Append-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceHistoryRecord {
    pub product_id: Uuid,
    pub price: u64,
    pub is_sold_out: bool,
    pub observed_at: DateTime<Utc>,
}
