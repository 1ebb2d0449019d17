//! Async storage traits implemented by the SeaORM adapters. Keeping them in
//! the domain crate lets handler and pipeline logic be tested against mocks.

mod traits;

pub use traits::*;
