//! PWA Cache HTTP Host
//!
//! This crate provides the Axum-based HTTP front of the offline agent:
//! every request that is not an agent endpoint is turned into an
//! intercepted request and handed to the active cache policy controller.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
