//! Enumerations shared across the SWITCHBOARD workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An LLM vendor the gateway can route to.
///
/// The serialized names are the wire labels clients see in agent
/// configuration, attempt logs and the pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "vendorA")]
    VendorA,
    #[serde(rename = "vendorB")]
    VendorB,
}

impl Vendor {
    /// All known vendors, in registration order.
    pub const ALL: [Vendor; 2] = [Vendor::VendorA, Vendor::VendorB];

    pub const fn as_str(self) -> &'static str {
        match self {
            Vendor::VendorA => "vendorA",
            Vendor::VendorB => "vendorB",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendorA" => Ok(Vendor::VendorA),
            "vendorB" => Ok(Vendor::VendorB),
            other => Err(UnknownVendor(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized vendor label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown vendor: {0}")]
pub struct UnknownVendor(pub String);

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Outcome of a single vendor attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => f.write_str("success"),
            AttemptOutcome::Failed => f.write_str("failed"),
        }
    }
}
