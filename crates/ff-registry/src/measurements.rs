//! Measurements: named joint constraints over observables.

use std::collections::{BTreeMap, HashMap, HashSet};

use ff_core::{Error, Result};
use ff_prob::Distribution;
use rand::Rng;

use crate::observables::ObsRef;

/// One joint constraint: a distribution together with the observables it
/// constrains, in axis order.
#[derive(Debug, Clone)]
pub struct ConstraintBlock {
    observables: Vec<ObsRef>,
    distribution: Distribution,
}

impl ConstraintBlock {
    /// Constrained observables in axis order.
    pub fn observables(&self) -> &[ObsRef] {
        &self.observables
    }

    /// The constraint distribution.
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

/// A named measurement holding one or more constraint blocks.
#[derive(Debug, Clone)]
pub struct Measurement {
    name: String,
    constraints: Vec<ConstraintBlock>,
}

impl Measurement {
    /// Empty measurement.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), constraints: Vec::new() }
    }

    /// Measurement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a joint constraint over `observables`.
    ///
    /// The distribution dimension must equal the number of observables.
    pub fn add_constraint(
        &mut self,
        observables: Vec<ObsRef>,
        distribution: Distribution,
    ) -> Result<()> {
        if observables.is_empty() {
            return Err(Error::Configuration(format!(
                "measurement '{}': constraint with no observables",
                self.name
            )));
        }
        if distribution.dim() != observables.len() {
            return Err(Error::Configuration(format!(
                "measurement '{}': distribution dimension {} does not match {} observables",
                self.name,
                distribution.dim(),
                observables.len()
            )));
        }
        self.constraints.push(ConstraintBlock { observables, distribution });
        Ok(())
    }

    /// Constraint blocks in insertion order.
    pub fn constraints(&self) -> &[ConstraintBlock] {
        &self.constraints
    }

    /// All constrained observables, deduplicated, in first-appearance order.
    pub fn all_observables(&self) -> Vec<ObsRef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for block in &self.constraints {
            for obs in &block.observables {
                if seen.insert(obs.clone()) {
                    out.push(obs.clone());
                }
            }
        }
        out
    }

    /// One random draw of every constrained observable.
    pub fn sample_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HashMap<ObsRef, f64>> {
        let mut out = HashMap::new();
        for block in &self.constraints {
            let draw = block.distribution.sample(rng)?;
            for (obs, value) in block.observables.iter().zip(draw) {
                out.insert(obs.clone(), value);
            }
        }
        Ok(out)
    }

    /// Joint log-density of all constraints at `values`, with the
    /// observables in `exclude` marginalized out of their blocks.
    ///
    /// A missing value for a non-excluded observable is a fatal lookup
    /// error.
    pub fn log_probability_all(
        &self,
        values: &HashMap<ObsRef, f64>,
        exclude: &HashSet<ObsRef>,
    ) -> Result<f64> {
        let mut total = 0.0;
        for block in &self.constraints {
            let mut excluded_axes = Vec::new();
            let mut x = vec![0.0; block.observables.len()];
            for (i, obs) in block.observables.iter().enumerate() {
                if exclude.contains(obs) {
                    excluded_axes.push(i);
                    // placeholder, marginalized out below
                    x[i] = block.distribution.central(i);
                } else {
                    x[i] = *values.get(obs).ok_or_else(|| {
                        Error::Lookup(format!(
                            "measurement '{}': no value given for observable '{}'",
                            self.name, obs
                        ))
                    })?;
                }
            }
            total += block.distribution.logpdf_excluding(&x, &excluded_axes)?;
        }
        Ok(total)
    }
}

/// Stores measurements by name, with pseudo-measurements kept in a
/// namespace of their own so that registering them never changes which
/// experimental measurements a fit considers relevant.
#[derive(Debug, Clone, Default)]
pub struct MeasurementRegistry {
    experimental: BTreeMap<String, Measurement>,
    pseudo: BTreeMap<String, Measurement>,
}

impl MeasurementRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an experimental measurement, replacing any previous one of
    /// the same name.
    pub fn insert(&mut self, measurement: Measurement) {
        self.experimental.insert(measurement.name().to_string(), measurement);
    }

    /// Register a pseudo-measurement with replace semantics.
    pub fn insert_pseudo(&mut self, measurement: Measurement) {
        self.pseudo.insert(measurement.name().to_string(), measurement);
    }

    /// Experimental measurement by name.
    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.experimental.get(name)
    }

    /// Pseudo-measurement by name.
    pub fn get_pseudo(&self, name: &str) -> Option<&Measurement> {
        self.pseudo.get(name)
    }

    /// Names of all experimental measurements, in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.experimental.keys().map(String::as_str)
    }

    /// All experimental measurements.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.experimental.values()
    }
}
