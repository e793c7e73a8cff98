use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Any, AnyPool, QueryBuilder, Row};

use crate::db::IN_LIST_CHUNK;
use crate::snapshot::port::KeyValueCache;

/// Key/value cache persisted in the `cache_entries` table.
pub struct SqlxKeyValueCache {
    pool: AnyPool,
}

impl SqlxKeyValueCache {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueCache for SqlxKeyValueCache {
    async fn multi_get(&self, keys: &[String]) -> anyhow::Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<String, String> = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(IN_LIST_CHUNK) {
            let mut qb: QueryBuilder<Any> = QueryBuilder::new(
                "SELECT cache_key, cache_value FROM cache_entries WHERE cache_key IN (",
            );
            let mut sep = qb.separated(", ");
            for k in chunk {
                sep.push_bind(k.clone());
            }
            sep.push_unseparated(")");

            for r in qb.build().fetch_all(&self.pool).await? {
                found.insert(r.try_get("cache_key")?, r.try_get("cache_value")?);
            }
        }

        Ok(keys.iter().map(|k| found.get(k).cloned()).collect())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT cache_value FROM cache_entries WHERE cache_key = ?;")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(r.try_get("cache_value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO cache_entries (cache_key, cache_value)
VALUES (?, ?)
ON CONFLICT (cache_key) DO UPDATE SET cache_value = excluded.cache_value;
"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
