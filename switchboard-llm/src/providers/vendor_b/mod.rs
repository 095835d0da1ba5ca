//! Vendor B adapter
//!
//! Messages-style HTTP API with a top-level `system` field and typed content
//! blocks. Rate-limit responses carry a hold time in the error body
//! (`retry_after_ms`) with the `Retry-After` header as fallback.

pub mod types;

use crate::providers::retry_after_ms_from_headers;
use crate::{NormalizedRequest, NormalizedResponse, VendorAdapter, VendorFailure};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use switchboard_core::Vendor;
use types::{ApiError, ContentBlock, MessageRequest, MessageResponse, ToolRef, WireMessage};

const DEFAULT_MODEL: &str = "vb-converse-2";
const DEFAULT_MAX_TOKENS: i64 = 4096;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP adapter for vendor B.
pub struct VendorBAdapter {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: i64,
    request_timeout: Duration,
}

impl VendorBAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn build_request(&self, request: &NormalizedRequest) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: if request.system_prompt.is_empty() {
                None
            } else {
                Some(request.system_prompt.clone())
            },
            messages: request
                .messages
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str().to_string(),
                    content: turn.content.clone(),
                })
                .collect(),
            tools: request
                .enabled_tools
                .iter()
                .map(|name| ToolRef { name: name.clone() })
                .collect(),
        }
    }
}

#[async_trait]
impl VendorAdapter for VendorBAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::VendorB
    }

    async fn complete(
        &self,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse, VendorFailure> {
        let vendor = self.vendor();
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request(request);

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VendorFailure::timeout(vendor)
                } else {
                    VendorFailure::unknown(vendor, format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as i64;

        if status.is_success() {
            let parsed: MessageResponse = response.json().await.map_err(|e| {
                VendorFailure::unknown(vendor, format!("Failed to parse response: {e}"))
            })?;
            let text = parsed
                .content
                .into_iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => text,
                })
                .collect::<Vec<_>>()
                .join("");

            Ok(NormalizedResponse {
                text,
                tokens_in: parsed.usage.input_tokens.max(0),
                tokens_out: parsed.usage.output_tokens.max(0),
                latency_ms,
            })
        } else {
            let header_hold = retry_after_ms_from_headers(response.headers());
            let raw = response.text().await.unwrap_or_default();
            let (code, message, body_hold) = match serde_json::from_str::<ApiError>(&raw) {
                Ok(parsed) => (
                    parsed.error.kind.to_uppercase(),
                    parsed.error.message,
                    parsed.retry_after_ms,
                ),
                Err(_) => ("PROVIDER_ERROR".to_string(), raw, None),
            };

            Err(VendorFailure::from_status(
                vendor,
                status.as_u16() as i32,
                code,
                message,
                body_hold.or(header_hold),
            ))
        }
    }
}

impl std::fmt::Debug for VendorBAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorBAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
