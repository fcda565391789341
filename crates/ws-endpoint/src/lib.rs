//! WebSub Callback Endpoint
//!
//! Inbound HTTP handlers the hub calls to confirm intents, report denials
//! and deliver content. Built on axum; the binary adds tracing and serving.

pub mod api;
pub mod callback_metrics;
pub mod error;

pub use api::{create_router, CallbackState};
pub use error::CallbackError;
