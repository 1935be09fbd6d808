//! New-physics coupling values at a reference scale.

use std::collections::HashMap;
use std::rc::Rc;

use ff_core::{NamedValues, Result};

/// Maps the free coupling parameters of a fit to physical coupling values.
///
/// Invoked with the coupling sub-vector of the fit point; the returned map
/// is fed to [`Couplings::set_initial`].
pub type CouplingFn = Rc<dyn Fn(&NamedValues) -> Result<HashMap<String, f64>>>;

/// A set of coupling values initialized at an input energy scale.
///
/// The Standard Model corresponds to every coupling being zero, so an
/// empty value map is the SM point.
#[derive(Debug, Clone, Default)]
pub struct Couplings {
    values: HashMap<String, f64>,
    scale: f64,
}

impl Couplings {
    /// Standard Model couplings (no new physics).
    pub fn sm() -> Self {
        Self::default()
    }

    /// Set the initial coupling values at `scale`, replacing any previous
    /// initialization.
    pub fn set_initial(&mut self, values: HashMap<String, f64>, scale: f64) {
        self.values = values;
        self.scale = scale;
    }

    /// Value of a coupling; unset couplings are at their SM value of zero.
    pub fn value(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// The scale the couplings were initialized at.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// True if no coupling deviates from the SM.
    pub fn is_sm(&self) -> bool {
        self.values.values().all(|v| *v == 0.0)
    }
}
