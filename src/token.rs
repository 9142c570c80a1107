//! Session token decoding and inspection.
//!
//! Tokens are decoded, never verified: signature validity is the backend's
//! job, and keeping it there means the gateway tier never holds signing
//! secrets. The decoded claims are advisory input for routing decisions only.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived access token (15 minutes)
    Access,
    /// Long-lived refresh token (7 days), revocation tracked by the backend via JTI
    Refresh,
}

impl TokenType {
    /// Wire name of the token type, as carried in the `type` claim.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims decoded from a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedToken {
    /// Subject (user id)
    pub sub: String,
    /// Email display metadata
    #[serde(default)]
    pub email: Option<String>,
    /// Name display metadata
    #[serde(default)]
    pub name: Option<String>,
    /// Token type
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// JWT ID (backend revocation bookkeeping, opaque here)
    #[serde(default)]
    pub jti: Option<String>,
}

impl DecodedToken {
    /// Whether this token can fill the given slot: the type must match and
    /// the expiry must be in the future. Expired or mis-typed tokens are
    /// treated as absent by every caller.
    pub fn is_usable(&self, expected: TokenType) -> bool {
        self.token_type == expected && self.exp > unix_now()
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Decode a session token without verifying its signature.
///
/// Returns `None` for anything that is not a three-segment JWT with a
/// base64url JSON payload carrying the expected claims. Never panics,
/// regardless of input.
pub fn decode(token: &str) -> Option<DecodedToken> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    let _signature = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
