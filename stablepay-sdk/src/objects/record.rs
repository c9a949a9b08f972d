//! Payloads for recording a settled on-chain payment against an order.

use serde::{Deserialize, Serialize};

/// Request payload for recording a settled payment.
///
/// Sent to `POST /api/record-custom-payment` after the customer's transfer
/// has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    /// Custom payment method identifier configured on the order backend.
    pub cpm_id: String,
    /// On-chain transaction hash of the settled transfer.
    pub hash: String,
    /// Settled amount in USD.  Serialized as a decimal string.
    pub amount: rust_decimal::Decimal,
    pub metadata: RecordMetadata,
}

/// Customer and order details attached to a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}
