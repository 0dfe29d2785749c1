//! Shared utilities for swap chain clients
//!
//! Holds the remote-rejection error every client reports and small hex helpers
//! used by both the clients and the swap core.

use std::fmt;

// ============================================================================
// API ERROR
// ============================================================================

/// A request that reached the remote node or service and was rejected by it.
///
/// Clients wrap this in `anyhow::Error` so callers can recover it with
/// `downcast_ref::<ApiError>()` and tell remote rejections apart from
/// transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Rejection reason as reported by the remote side
    pub reason: String,
    /// Remote error code, when one was reported
    pub code: Option<i64>,
}

impl ApiError {
    pub fn new(reason: impl Into<String>, code: Option<i64>) -> Self {
        Self {
            reason: reason.into(),
            code,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.reason, code),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// HEX HELPERS
// ============================================================================

/// Strips a leading `0x` (or `0X`) from a hex string.
pub fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parses a `0x`-prefixed hex quantity (as returned by JSON-RPC nodes) into a u128.
pub fn parse_hex_quantity(value: &str) -> Option<u128> {
    let digits = strip_0x(value);
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}
