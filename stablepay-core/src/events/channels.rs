//! Channel factories and handles for checkout messaging.

use tokio::sync::mpsc;

use super::types::{CheckoutCommand, CheckoutEvent};

/// Default buffer size for checkout channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for CheckoutCommand messages.
pub type CheckoutCommandSender = mpsc::Sender<CheckoutCommand>;
/// Receiver handle for CheckoutCommand messages.
pub type CheckoutCommandReceiver = mpsc::Receiver<CheckoutCommand>;

/// Sender handle for CheckoutEvent messages.
pub type CheckoutEventSender = mpsc::Sender<CheckoutEvent>;
/// Receiver handle for CheckoutEvent messages.
pub type CheckoutEventReceiver = mpsc::Receiver<CheckoutEvent>;

/// Create a new CheckoutCommand channel.
///
/// Returns a (sender, receiver) pair. Multiple frontends can clone the
/// sender; the orchestrator owns the receiver.
pub fn checkout_command_channel() -> (CheckoutCommandSender, CheckoutCommandReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new CheckoutEvent channel.
///
/// Returns a (sender, receiver) pair. The orchestrator owns the sender.
pub fn checkout_event_channel() -> (CheckoutEventSender, CheckoutEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
