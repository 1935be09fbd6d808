//! Error types for flavfit

use thiserror::Error;

/// flavfit error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid fit configuration, rejected eagerly at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more fit observables are not constrained by any measurement
    #[error("No measurement found for the observables: {}", .0.join(", "))]
    UnconstrainedObservable(Vec<String>),

    /// A name was not found in a registry at evaluation time
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Numerical failure (singular covariance, malformed variance)
    #[error("Numerical error: {0}")]
    Numerical(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
