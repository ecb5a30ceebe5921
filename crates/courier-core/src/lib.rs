//! courier-core: shared types, wire conventions, and configuration.
//! All other courier crates depend on this one.

pub mod config;
pub mod error;
pub mod wire;

pub use config::{CourierConfig, TransferConfig};
pub use error::SendError;
