pub mod checkout;

use serde::{Deserialize, Serialize};
use stablepay_sdk::objects::session::SessionStatus;

/// Checkout stage owned by the orchestrator.
///
/// This is the state-machine version, and it only ever moves forward. For
/// the raw status reported by the integration service, see
/// `stablepay_sdk::objects::session::SessionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStage {
    /// Session creation is in flight.
    #[default]
    Loading,
    /// Session exists; waiting for the customer's transfer.
    Pending,
    /// A transfer has been observed and is confirming.
    Processing,
    /// The payment settled.  Terminal.
    Completed,
    /// The session failed or expired.  Terminal.
    Failed,
}

impl PaymentStage {
    /// Whether this stage admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStage::Completed | PaymentStage::Failed)
    }

    /// The stage transition table.  A checkout may only move forward:
    ///
    /// * `Loading` may become any later stage.
    /// * `Pending` may become `Processing`, `Completed`, or `Failed`.
    /// * `Processing` may become `Completed` or `Failed`.
    /// * `Completed` and `Failed` admit nothing.
    pub fn can_transition_to(self, next: PaymentStage) -> bool {
        use PaymentStage::*;
        matches!(
            (self, next),
            (Loading, Pending)
                | (Loading, Processing)
                | (Loading, Completed)
                | (Loading, Failed)
                | (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Map a wire status onto a stage.
    ///
    /// `EXPIRED` collapses into [`PaymentStage::Failed`]: an expired session
    /// can never settle, and the retry path is the same.  Statuses this
    /// client does not recognize map to `None` and leave the stage alone.
    pub fn from_wire(status: SessionStatus) -> Option<PaymentStage> {
        match status {
            SessionStatus::Pending => Some(PaymentStage::Pending),
            SessionStatus::Processing => Some(PaymentStage::Processing),
            SessionStatus::Completed => Some(PaymentStage::Completed),
            SessionStatus::Failed | SessionStatus::Expired => Some(PaymentStage::Failed),
            SessionStatus::Unknown => None,
        }
    }
}

impl std::fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStage::Loading => write!(f, "LOADING"),
            PaymentStage::Pending => write!(f, "PENDING"),
            PaymentStage::Processing => write!(f, "PROCESSING"),
            PaymentStage::Completed => write!(f, "COMPLETED"),
            PaymentStage::Failed => write!(f, "FAILED"),
        }
    }
}
