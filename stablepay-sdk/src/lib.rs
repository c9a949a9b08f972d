//! Shared SDK for the Stablepay checkout: wire objects exchanged with the
//! integration service, the EIP-681 transfer URI builder, and HTTP clients
//! gated behind the `client` cargo feature.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod eip681;
pub mod objects;
