//! Library entrypoint for embedding the settlement sweep inside other
//! binaries. The binary in `main.rs` remains available for standalone
//! deployments; co-locating with the API process is also fine since the
//! sweep only touches the database.

pub mod pipeline;
pub mod worker;

pub use pipeline::settle_once;
pub use worker::{run_settlement, SettlementError};
