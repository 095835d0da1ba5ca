//! Concrete vendor adapter implementations

pub mod vendor_a;
pub mod vendor_b;

pub use vendor_a::VendorAAdapter;
pub use vendor_b::VendorBAdapter;

use reqwest::header::HeaderMap;

/// Parse a `Retry-After` header (delta-seconds form) into milliseconds.
pub(crate) fn retry_after_ms_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|seconds| seconds * 1000)
}
