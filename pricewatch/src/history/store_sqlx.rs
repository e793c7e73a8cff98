use async_trait::async_trait;
use sqlx::{Any, AnyPool, QueryBuilder};
use uuid::Uuid;

use crate::db::{bool_to_i64, u64_to_i64};
use crate::history::PriceHistoryRecord;
use crate::history::store::HistoryStore;

/// Rows per INSERT statement; keeps bind counts well under SQLite's parameter limit.
const ROWS_PER_STATEMENT: usize = 500;

pub struct SqlxHistoryStore {
    pool: AnyPool,
}

impl SqlxHistoryStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for SqlxHistoryStore {
    async fn insert_many(&self, records: &[PriceHistoryRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Convert up front so a bad value never leaves a half-written batch.
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            rows.push((
                Uuid::new_v4().to_string(),
                r.product_id.to_string(),
                u64_to_i64(r.price)?,
                bool_to_i64(r.is_sold_out),
                r.observed_at.timestamp_millis(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Any> = QueryBuilder::new(
                "INSERT INTO price_history (record_id, product_id, price, is_sold_out, observed_at_ms) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.0.clone())
                    .push_bind(row.1.clone())
                    .push_bind(row.2)
                    .push_bind(row.3)
                    .push_bind(row.4);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = records.len(), "price history appended");
        Ok(())
    }
}
