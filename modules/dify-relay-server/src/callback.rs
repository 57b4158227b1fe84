use std::time::Duration;

use dify_relay_common::WorkflowResponse;
use serde::Serialize;
use tracing::info;

use crate::error::{RelayError, Result};

/// Body POSTed to a caller's callback URL.
#[derive(Debug, Serialize)]
pub struct CallbackEnvelope<'a> {
    pub request_id: &'a str,
    pub result: &'a WorkflowResponse,
    /// Unix seconds at delivery time.
    pub timestamp: i64,
}

impl<'a> CallbackEnvelope<'a> {
    pub fn new(request_id: &'a str, result: &'a WorkflowResponse) -> Self {
        Self {
            request_id,
            result,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Single-attempt webhook delivery.
#[derive(Clone)]
pub struct CallbackNotifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl CallbackNotifier {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn deliver(
        &self,
        callback_url: &str,
        request_id: &str,
        result: &WorkflowResponse,
    ) -> Result<()> {
        let envelope = CallbackEnvelope::new(request_id, result);

        let resp = self
            .client
            .post(callback_url)
            .header("X-Request-ID", request_id)
            .json(&envelope)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Callback(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::Callback(format!(
                "callback returned status {}",
                status.as_u16()
            )));
        }

        info!(request_id, callback_url, "Callback delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn notifier() -> CallbackNotifier {
        CallbackNotifier::new(reqwest::Client::new(), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn posts_envelope_with_request_id_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("x-request-id", "req-7")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "request_id": "req-7",
                "result": {"error_message": "boom"}
            })))
            .with_status(204)
            .create_async()
            .await;

        let result = WorkflowResponse::failed("boom");
        notifier()
            .deliver(&format!("{}/hook", server.url()), "req-7", &result)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_is_a_callback_error() {
        let mut server = mockito::Server::new_async().await;
        let _hook = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let result = WorkflowResponse::failed("boom");
        let err = notifier()
            .deliver(&format!("{}/hook", server.url()), "req-7", &result)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "callback delivery failed: callback returned status 500");
    }

    #[test]
    fn envelope_timestamp_is_unix_seconds() {
        let result = WorkflowResponse::default();
        let envelope = CallbackEnvelope::new("req-1", &result);
        let now = chrono::Utc::now().timestamp();
        assert!((now - envelope.timestamp).abs() <= 1);
    }
}
