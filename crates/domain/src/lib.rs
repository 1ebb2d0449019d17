//! Domain-level building blocks shared across the API and settlement crates.
//!
//! Everything the HTTP surface and the background worker agree on lives here:
//! the ad-event and creator-earnings models, the pure revenue math, the
//! environment-driven configuration contract, and the storage traits the
//! SeaORM adapters implement.

pub mod config;
pub mod model;
pub mod revenue;
pub mod services;
pub mod storage;

pub use model::*;
pub use revenue::*;
pub use storage::*;
