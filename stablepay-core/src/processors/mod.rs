//! Processors driving the checkout pipeline.
//!
//! This module contains the processors that handle checkout work:
//!
//! - `CheckoutOrchestrator`: drives one payment session from creation to
//!   settlement, publishing state snapshots and emitting lifecycle events

pub mod checkout;

pub use checkout::{
    CheckoutHandle, CheckoutOrchestrator, CheckoutTiming, TokenConfig, BASE_USDC_CONTRACT,
};
