//! Shared service helpers: impression-dedup caching, unknown-campaign fraud
//! tracking, and telemetry wiring.

pub mod cache;
pub mod fraud;
pub mod telemetry;

pub use cache::*;
pub use fraud::*;
pub use telemetry::*;
