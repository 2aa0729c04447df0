//! Common utilities and types shared across the IPVS workspace crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
