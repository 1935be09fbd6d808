//! Named-instance registries for flavfit.
//!
//! Parameters, observables and measurements are looked up by name. Unlike
//! ambient global state, registries here are plain values injected into fit
//! construction, which keeps tests isolated and ownership explicit.

pub mod couplings;
pub mod measurements;
pub mod observables;
pub mod parameters;

pub use couplings::{CouplingFn, Couplings};
pub use measurements::{ConstraintBlock, Measurement, MeasurementRegistry};
pub use observables::{ObsRef, Observable, ObservableRegistry, PredictionFn};
pub use parameters::{Parameter, ParameterRegistry};
