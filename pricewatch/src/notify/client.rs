use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::notify::errors::PushError;
use crate::notify::message::PushMessage;
use crate::notify::provider::{PushProvider, SendOutcome};

#[derive(Serialize)]
struct BatchRequest<'a> {
    messages: &'a [PushMessage],
}

#[derive(Deserialize)]
struct BatchResponse {
    responses: Vec<MessageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    success: bool,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP push relay client: `POST {endpoint}/messages/batch`.
#[derive(Clone)]
pub struct HttpPushProvider {
    http: Client,
    batch_url: Url,
}

impl HttpPushProvider {
    pub fn new(endpoint: &str) -> Result<Self, PushError> {
        let mut batch_url = Url::parse(endpoint)
            .map_err(|e| PushError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        batch_url
            .path_segments_mut()
            .map_err(|_| PushError::InvalidEndpoint(endpoint.to_string()))?
            .pop_if_empty()
            .extend(["messages", "batch"]);

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, batch_url })
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    #[instrument(skip_all, fields(count = messages.len()), level = "debug")]
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<SendOutcome>, PushError> {
        let resp = self
            .http
            .post(self.batch_url.clone())
            .json(&BatchRequest { messages })
            .send()
            .await?
            .error_for_status()?;

        let body: BatchResponse = resp.json().await?;

        Ok(align_outcomes(messages.len(), body.responses))
    }
}

/// Maps provider responses onto the request order.
///
/// Missing tail entries are failures; surplus entries are dropped.
fn align_outcomes(expected: usize, responses: Vec<MessageResponse>) -> Vec<SendOutcome> {
    if responses.len() != expected {
        warn!(
            expected,
            received = responses.len(),
            "push provider response length mismatch"
        );
    }

    let mut out: Vec<SendOutcome> = responses
        .into_iter()
        .take(expected)
        .map(|r| {
            if r.success {
                debug!(message_id = ?r.message_id, "push accepted");
                SendOutcome::ok()
            } else {
                SendOutcome::failed(r.error.unwrap_or_else(|| "rejected".to_string()))
            }
        })
        .collect();

    while out.len() < expected {
        out.push(SendOutcome::failed("missing provider response"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(success: bool) -> MessageResponse {
        MessageResponse {
            success,
            message_id: None,
            error: None,
        }
    }

    #[test]
    fn short_response_marks_tail_failed() {
        let out = align_outcomes(3, vec![resp(true)]);

        assert_eq!(out.len(), 3);
        assert!(out[0].success);
        assert!(!out[1].success);
        assert!(!out[2].success);
    }

    #[test]
    fn surplus_responses_are_ignored() {
        let out = align_outcomes(1, vec![resp(false), resp(true)]);

        assert_eq!(out, vec![SendOutcome::failed("rejected")]);
    }

    #[test]
    fn builds_batch_url_under_base_path() {
        let p = HttpPushProvider::new("http://push.local/v1/").unwrap();
        assert_eq!(p.batch_url.as_str(), "http://push.local/v1/messages/batch");
    }
}
