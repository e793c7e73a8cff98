use anyhow::Result;
use async_trait::async_trait;

/// Raw key/value cache shared with other services.
///
/// Single-key writes are atomic; no cross-key transactions are assumed.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// One round trip; the result is positionally aligned with `keys`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;
}
