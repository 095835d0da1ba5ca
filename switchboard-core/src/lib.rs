//! SWITCHBOARD Core
//!
//! Shared vocabulary of the gateway workspace: strongly-typed entity IDs,
//! the tenant-owned entity structs, wire-facing enums, layer error types and
//! the retry policy. Everything here is plain data - no I/O.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use config::RetryPolicy;
pub use entities::{
    Agent, AttemptLog, Credential, IdempotencyRecord, Message, Session, Tenant, UsageEvent,
};
pub use enums::{AttemptOutcome, MessageRole, SessionStatus, UnknownVendor, Vendor};
pub use error::{ConfigError, StorageError};
pub use identity::{
    sha256_hex, AgentId, AttemptId, CredentialId, EntityIdParseError, EntityIdType, MessageId,
    SessionId, TenantId, Timestamp, UsageEventId,
};
