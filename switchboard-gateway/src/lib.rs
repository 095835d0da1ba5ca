//! SWITCHBOARD Gateway
//!
//! The message-send pipeline of the multi-tenant LLM gateway: the identity
//! gate, the idempotency protocol, the conversation pipeline and the wire
//! envelopes. The HTTP transport and the management plane sit in front of
//! and beside this crate; everything here is transport-agnostic.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod idempotency;
pub mod pipeline;

pub use auth::{credential_hash, AuthContext, AuthGate};
pub use config::GatewayConfig;
pub use envelope::{
    AttemptView, EnvelopeMessage, EnvelopeMetadata, IdempotencyView, PricingView,
    SendMessageEnvelope, UsageView,
};
pub use error::{ErrorCode, ErrorEnvelope, GatewayError};
pub use idempotency::{
    request_fingerprint, BeginSend, IdempotencyGate, MAX_KEY_LENGTH, SEND_MESSAGE_SCOPE,
};
pub use pipeline::{ConversationPipeline, SendMessageRequest};
