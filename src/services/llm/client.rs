use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompt::CompletionRequest;
use crate::config::TutorConfig;
use crate::error::TransportError;

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Streaming client for an OpenAI-compatible chat completions gateway.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: TutorConfig,
}

impl ChatClient {
    pub fn new(config: &TutorConfig) -> Self {
        Self {
            client: Client::builder()
                // No overall timeout: a reply can legitimately stream for minutes
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            config: config.clone(),
        }
    }

    /// Sends the request and hands back the raw SSE body as it arrives.
    pub async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, TransportError> {
        let key = self
            .config
            .api_key()
            .map_err(|e| TransportError::Config(e.to_string()))?;
        let url = &self.config.gateway_url;

        debug!(
            "Requesting completion from {} ({} messages)",
            url,
            request.messages.len()
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            warn!("Gateway rejected completion: {}", err);
            return Err(err);
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| TransportError::Network(e.to_string()));
        Ok(stream.boxed())
    }
}

/// Maps a non-2xx response onto its error category.
pub fn classify_failure(status: StatusCode, body: &str) -> TransportError {
    let message = error_message(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited(message),
        StatusCode::PAYMENT_REQUIRED => TransportError::QuotaExhausted(message),
        _ => TransportError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

// Accepts `{"error": "..."}` and `{"error": {"message": "..."}}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };
    match value.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}
