use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid response from push provider: {0}")]
    InvalidResponse(String),
}
