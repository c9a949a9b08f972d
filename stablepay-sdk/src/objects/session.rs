//! Payment session payloads for the integration service.
//!
//! The integration service speaks camelCase JSON; the serde renames below
//! keep the Rust structs idiomatic while staying byte-compatible with the
//! wire.

use serde::{Deserialize, Serialize};

/// Request payload for creating a new payment session.
///
/// Sent to `POST /integrations/public/stripe/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Order total in integer US cents.
    pub amount_usd_cents: u64,
    /// Merchant integration identifier.
    pub integration_id: String,
    /// Caller-chosen identifier correlating this session with an order.
    pub payment_intent_id: String,
    /// Customer details forwarded to the settlement record.
    pub user_meta_data: UserMetaData,
    /// Settlement chain, e.g. `"BASE"`.
    pub chain: String,
    /// Settlement token, e.g. `"USDC"`.
    pub stablecoin: String,
}

/// Customer details embedded in a session creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetaData {
    pub name: String,
    pub email: String,
    pub address: String,
}

/// Response returned by the session creation endpoint.
///
/// Every field is optional; the service omits what it has not assigned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Bearer token authenticating subsequent status polls.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Deposit address the customer should pay to.
    #[serde(default)]
    pub deposit_address: Option<String>,
    /// Status reported at creation time.
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// Response returned by the session status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub transaction: Option<SessionTransaction>,
}

/// Transaction details attached to a status response once the customer's
/// payment has been observed on chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTransaction {
    #[serde(default)]
    pub payment_tx_hash: Option<String>,
}

/// Session status as reported by the integration service.
///
/// This is the wire version.  For the orchestrator's own stage, which only
/// ever moves forward, see `PaymentStage` in `stablepay-core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
    /// Any status this client does not recognize.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "PENDING"),
            SessionStatus::Processing => write!(f, "PROCESSING"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Failed => write!(f, "FAILED"),
            SessionStatus::Expired => write!(f, "EXPIRED"),
            SessionStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
