pub mod schema;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

#[derive(Clone)]
pub struct Db {
    pub pool: AnyPool,
}

impl Db {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = AnyPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        schema::migrate(&self.pool).await
    }
}

/// Max values bound into one `IN (...)` list.
pub(crate) const IN_LIST_CHUNK: usize = 500;

/* =========================
Numeric safety helpers
========================= */

pub(crate) fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        anyhow::bail!("negative i64 where u64 expected: {v}");
    }
    Ok(v as u64)
}

pub(crate) fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        anyhow::bail!("u64 too large for i64: {v}");
    }
    Ok(v as i64)
}

pub(crate) fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
