use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("product not found at shop")]
    NotFound,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid response from price gateway: {0}")]
    InvalidResponse(String),
}
