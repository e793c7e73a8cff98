use anyhow::Result;
use async_trait::async_trait;

use crate::history::PriceHistoryRecord;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends all records as one batch write.
    async fn insert_many(&self, records: &[PriceHistoryRecord]) -> Result<()>;
}
