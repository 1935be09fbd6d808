//! The flavfit fit engine.
//!
//! A fit is a collection of observables and parameters used to perform
//! statistical analyses: [`Fit`] validates and stores the configuration,
//! [`BayesianFit`] evaluates likelihood × prior over the full parameter
//! vector, and [`FastFit`] integrates nuisance parameters out into
//! pseudo-measurements for rapid likelihood scans.

pub mod bayesian;
pub mod fast;
pub mod fit;
pub mod vector;

pub use bayesian::BayesianFit;
pub use fast::{FastFit, DEFAULT_N_EXPERIMENT, DEFAULT_N_THEORY};
pub use fit::{Fit, FitConfig, DEFAULT_INPUT_SCALE};
pub use vector::{FitVector, VectorLayout};
