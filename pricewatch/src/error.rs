use thiserror::Error;

/// Conditions that abort a whole reconciliation cycle.
///
/// Per-product fetch failures, history/catalog write failures and per-message
/// send failures are isolated inside the cycle and never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("snapshot cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("a reconciliation cycle is already running")]
    AlreadyRunning,
}
