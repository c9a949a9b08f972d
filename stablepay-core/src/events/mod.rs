//! Messaging for the checkout pipeline.
//!
//! # Message Flow
//!
//! 1. A frontend sends `CheckoutCommand` -> `CheckoutOrchestrator`
//! 2. `CheckoutOrchestrator` publishes `CheckoutState` on a watch channel
//! 3. `CheckoutOrchestrator` emits `CheckoutEvent` -> the frontend
//!
//! State is published as a whole snapshot after every mutation, so a
//! watcher never observes a half-applied transition.

pub mod channels;
pub mod types;

pub use channels::{
    checkout_command_channel, checkout_event_channel, CheckoutCommandReceiver,
    CheckoutCommandSender, CheckoutEventReceiver, CheckoutEventSender, DEFAULT_CHANNEL_BUFFER,
};

pub use types::{CheckoutCommand, CheckoutEvent, CheckoutState};
