//! Vendor A adapter
//!
//! Completions-style HTTP API. The system prompt travels as the leading
//! `system` message and tools as a flat name list.

pub mod types;

use crate::providers::retry_after_ms_from_headers;
use crate::{NormalizedRequest, NormalizedResponse, VendorAdapter, VendorFailure};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use switchboard_core::Vendor;
use types::{ApiError, CompletionRequest, CompletionResponse, WireMessage};

const DEFAULT_MODEL: &str = "va-chat-1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP adapter for vendor A.
pub struct VendorAAdapter {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl VendorAAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
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

    fn build_request(&self, request: &NormalizedRequest) -> CompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        for turn in &request.messages {
            messages.push(WireMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            });
        }
        CompletionRequest {
            model: self.model.clone(),
            messages,
            tools: request.enabled_tools.clone(),
        }
    }
}

#[async_trait]
impl VendorAdapter for VendorAAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::VendorA
    }

    async fn complete(
        &self,
        request: &NormalizedRequest,
    ) -> Result<NormalizedResponse, VendorFailure> {
        let vendor = self.vendor();
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request(request);

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .bearer_auth(&self.api_key)
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
            let parsed: CompletionResponse = response.json().await.map_err(|e| {
                VendorFailure::unknown(vendor, format!("Failed to parse response: {e}"))
            })?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| VendorFailure::unknown(vendor, "response carried no choices"))?;

            Ok(NormalizedResponse {
                text,
                tokens_in: parsed.usage.prompt_tokens.max(0),
                tokens_out: parsed.usage.completion_tokens.max(0),
                latency_ms,
            })
        } else {
            let retry_after_ms = retry_after_ms_from_headers(response.headers());
            let raw = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ApiError>(&raw) {
                Ok(parsed) => (
                    parsed.error.code.unwrap_or_else(|| "PROVIDER_ERROR".to_string()),
                    parsed.error.message,
                ),
                Err(_) => ("PROVIDER_ERROR".to_string(), raw),
            };

            Err(VendorFailure::from_status(
                vendor,
                status.as_u16() as i32,
                code,
                message,
                retry_after_ms,
            ))
        }
    }
}

impl std::fmt::Debug for VendorAAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorAAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
