//! Event type definitions for the checkout pipeline.
//!
//! Commands flow into the orchestrator over an mpsc channel, lifecycle
//! events flow out over another, and the render-ready snapshot is published
//! on a watch channel so any number of frontends can observe it.

use serde::{Deserialize, Serialize};

use crate::entities::checkout::PaymentReceipt;
use crate::entities::PaymentStage;

/// Command sent by a frontend to the running orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutCommand {
    /// Start over after a failure with a fresh payment session.
    Retry,
    /// Dismiss the checkout and tear everything down.
    Close,
}

/// Lifecycle event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    /// The payment settled.  Emitted at most once per payment session.
    PaymentCompleted(PaymentReceipt),
    /// The orchestrator shut down, whether settled, dismissed, or failed.
    Closed,
}

/// Render-ready snapshot of a running checkout.
///
/// Published on a watch channel after every mutation, so observers always
/// see a consistent whole rather than piecemeal field updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutState {
    pub stage: PaymentStage,
    /// Deposit address the customer should pay to, once the session exists.
    pub deposit_address: Option<String>,
    /// EIP-681 transfer URI for the deposit address, when one could be built.
    pub payment_uri: Option<String>,
    /// On-chain hash of the customer's transfer, once observed.
    pub transaction_hash: Option<String>,
    /// User-facing failure message, set when the stage is `Failed`.
    pub error: Option<String>,
    /// Seconds until auto-dismissal, counting down after completion.
    pub auto_close_in: Option<u64>,
}
