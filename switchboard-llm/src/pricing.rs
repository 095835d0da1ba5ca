//! Pricing
//!
//! Pure cost computation: `(vendor, tokens_in, tokens_out) -> USD`, rounded
//! half-to-even at six decimal places. The table is immutable at runtime and
//! surfaced to clients verbatim through the management plane.

use serde::{Deserialize, Serialize};
use switchboard_core::Vendor;

/// USD per 1000 tokens, by vendor.
pub const VENDOR_A_USD_PER_1K: f64 = 0.002;
pub const VENDOR_B_USD_PER_1K: f64 = 0.003;

/// Rate for a vendor. Total over the enum - an unknown vendor cannot reach
/// this function.
pub const fn rate(vendor: Vendor) -> f64 {
    match vendor {
        Vendor::VendorA => VENDOR_A_USD_PER_1K,
        Vendor::VendorB => VENDOR_B_USD_PER_1K,
    }
}

/// Round half-to-even at six decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round_ties_even() / 1e6
}

/// Cost of one completed send.
pub fn cost_usd(vendor: Vendor, tokens_in: i64, tokens_out: i64) -> f64 {
    round6((tokens_in + tokens_out) as f64 / 1000.0 * rate(vendor))
}

/// Wire-visible pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(rename = "vendorA")]
    pub vendor_a: f64,
    #[serde(rename = "vendorB")]
    pub vendor_b: f64,
}

impl PricingTable {
    pub const fn current() -> Self {
        Self {
            vendor_a: VENDOR_A_USD_PER_1K,
            vendor_b: VENDOR_B_USD_PER_1K,
        }
    }

    pub const fn usd_per_1k(&self, vendor: Vendor) -> f64 {
        match vendor {
            Vendor::VendorA => self.vendor_a,
            Vendor::VendorB => self.vendor_b,
        }
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::current()
    }
}
