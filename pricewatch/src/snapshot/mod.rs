//! Snapshot cache: the last observed `{price, isSoldOut, lowestPrice}` per
//! product, used to detect change without re-reading history.
//!
//! Layers:
//! - `KeyValueCache` is the raw string port (multi-get / get / set).
//! - `SnapshotCache` owns key formatting and value encoding on top of it.
//! - `diff` decides whether an observation is a change and computes the next entry.

pub mod cache;
pub mod diff;
pub mod kv_sqlx;
pub mod memory;
pub mod model;
pub mod port;

pub use cache::SnapshotCache;
pub use diff::diff;
pub use kv_sqlx::SqlxKeyValueCache;
pub use memory::InMemoryKeyValueCache;
pub use model::{SnapshotEntry, product_key, token_key};
pub use port::KeyValueCache;
