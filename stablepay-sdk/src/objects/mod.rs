//! Wire objects exchanged with the integration service and the order
//! recording API.  Field names and casings mirror the JSON on the wire.

pub mod record;
pub mod session;
