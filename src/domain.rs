//! Domain layer: core entities, errors and port traits

pub mod error;
pub mod ports;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
