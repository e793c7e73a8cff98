use async_trait::async_trait;

use crate::notify::errors::PushError;
use crate::notify::message::PushMessage;

/// Per-message result of a batch send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }
}

/// Push transport. Success means "the provider accepted the message".
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Sends all messages in one call. Outcomes are positionally aligned with `messages`.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<SendOutcome>, PushError>;
}
