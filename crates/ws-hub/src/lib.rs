//! Outbound side of the subscription handshake.

pub mod client;
pub mod error;
pub mod probe;

pub use client::{callback_url, lease_from_secs, HubClient};
pub use error::{HubError, Result};
pub use probe::CallbackProbe;
