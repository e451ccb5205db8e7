//! Client for the remote text-completion endpoint
//!
//! The only wire protocol in the engine: `POST` a transcript plus system
//! prompt, get back `{"response": …}` or `{"error": …}`. The backend sits
//! behind a trait so the controller can be exercised against a scripted
//! implementation; the HTTP client includes retry logic for transient
//! network failures.

use crate::error::AskError;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Maximum number of retry attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Initial delay between retries (doubles with each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Default ask endpoint
pub const DEFAULT_ASK_URL: &str = "http://localhost:8080/api/ask";

/// Request body for the ask endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub transcript: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
}

/// Response body from the ask endpoint; either field may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AskReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AskReply {
    /// Text to show as the assistant's turn.
    ///
    /// A non-empty `response` wins; otherwise the error is rendered as a
    /// visible marker, with `No response` standing in when the body carried
    /// neither field.
    pub fn into_display_text(self) -> String {
        match self.response.filter(|r| !r.is_empty()) {
            Some(response) => response,
            None => format!(
                "[Error: {}]",
                self.error.unwrap_or_else(|| "No response".to_string())
            ),
        }
    }
}

/// Completion backend consumed by the session controller
#[async_trait]
pub trait AskBackend: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError>;
}

/// HTTP implementation of [`AskBackend`]
pub struct HttpAskClient {
    url: String,
    client: reqwest::Client,
}

impl HttpAskClient {
    /// Create a client for the given endpoint with the given request
    /// timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for HttpAskClient")?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Check if a reqwest error is retryable (transient).
    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

#[async_trait]
impl AskBackend for HttpAskClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError> {
        let mut last_error: Option<AskError> = None;
        let mut retry_delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!(
                    attempt,
                    max_retries = MAX_RETRIES,
                    delay_ms = retry_delay.as_millis(),
                    "Retrying ask request after transient failure"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let result = self
                .client
                .post(&self.url)
                .json(request)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        if attempt > 0 {
                            info!(attempt, "Ask request succeeded after retry");
                        }
                        return serde_json::from_str::<AskReply>(&body).map_err(|e| {
                            AskError::InvalidResponse(format!(
                                "Failed to parse response: {}",
                                e
                            ))
                        });
                    }

                    // The service reports its own failures as an error body,
                    // which callers render rather than treat as fatal.
                    if let Ok(reply) = serde_json::from_str::<AskReply>(&body) {
                        if reply.response.is_some() || reply.error.is_some() {
                            return Ok(reply);
                        }
                    }

                    let error = AskError::ServerError {
                        status: status.as_u16(),
                        message: body,
                    };

                    // Retry on 5xx server errors
                    if status.is_server_error() && attempt < MAX_RETRIES {
                        warn!(status = status.as_u16(), attempt, "Server error, will retry");
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    // Retry on network errors
                    if Self::is_retryable_error(&e) && attempt < MAX_RETRIES {
                        warn!(error = %e, attempt, "Network error, will retry");
                        last_error = Some(AskError::Network(e));
                        continue;
                    }

                    return Err(AskError::Network(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AskError::InvalidResponse("Unexpected retry loop exit".into())))
    }
}
