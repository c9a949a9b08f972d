//! Checkout entities owned by the orchestrator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stablepay_sdk::objects::session::{SessionResponse, SessionStatus, UserMetaData};

/// Customer details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub address: String,
}

impl CustomerDetails {
    /// Whether every field required for settlement reporting is present.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty() && !self.address.is_empty()
    }
}

impl From<CustomerDetails> for UserMetaData {
    fn from(value: CustomerDetails) -> Self {
        Self {
            name: value.name,
            email: value.email,
            address: value.address,
        }
    }
}

/// Everything the orchestrator needs to run one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Order total in USD.
    pub amount: Decimal,
    /// Merchant integration identifier.
    pub integration_id: String,
    /// Identifier correlating this checkout with an order.
    pub payment_intent_id: String,
    pub customer: CustomerDetails,
}

/// The session record captured from a creation response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentSession {
    pub session_token: Option<String>,
    pub deposit_address: Option<String>,
    pub reported_status: Option<SessionStatus>,
}

impl From<SessionResponse> for PaymentSession {
    fn from(value: SessionResponse) -> Self {
        Self {
            session_token: value.session_token,
            deposit_address: value.deposit_address,
            reported_status: value.status,
        }
    }
}

/// A settled payment, emitted once per completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// On-chain transaction hash of the settling transfer.
    pub transaction_hash: String,
    pub customer: CustomerDetails,
    /// Order total in USD.
    pub amount: Decimal,
    pub completed_at: time::OffsetDateTime,
}
