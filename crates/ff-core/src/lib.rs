//! Core types and errors shared across the flavfit crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::NamedValues;
