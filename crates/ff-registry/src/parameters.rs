//! Parameters with prior constraints.

use std::collections::{BTreeMap, HashMap, HashSet};

use ff_core::{Error, Result};
use ff_prob::Univariate;
use rand::Rng;

/// Parameter values keyed by name.
pub type ParameterMap = HashMap<String, f64>;

/// A named parameter with its prior distribution.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    prior: Univariate,
}

impl Parameter {
    /// Define a parameter with a prior.
    pub fn new(name: impl Into<String>, prior: Univariate) -> Self {
        Self { name: name.into(), prior }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prior distribution.
    pub fn prior(&self) -> &Univariate {
        &self.prior
    }
}

/// Stores named parameters with priors; supports central-value lookup,
/// random sampling, and batched log-density evaluation with exclusions.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    parameters: BTreeMap<String, Parameter>,
}

impl ParameterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous definition of the same name.
    pub fn define(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.name().to_string(), parameter);
    }

    /// Existence check by name.
    pub fn has(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Parameter names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Central value of one parameter.
    pub fn central(&self, name: &str) -> Result<f64> {
        self.parameters
            .get(name)
            .map(|p| p.prior.central())
            .ok_or_else(|| Error::Lookup(format!("parameter '{}' not found", name)))
    }

    /// Central values of all parameters.
    pub fn central_all(&self) -> ParameterMap {
        self.parameters
            .iter()
            .map(|(n, p)| (n.clone(), p.prior.central()))
            .collect()
    }

    /// One independent random draw of every parameter from its prior.
    pub fn sample_all<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterMap {
        self.parameters
            .iter()
            .map(|(n, p)| (n.clone(), p.prior.sample(rng)))
            .collect()
    }

    /// Sum of prior log-densities of all parameters not in `exclude`,
    /// evaluated at `values`. A missing value for a non-excluded parameter
    /// is a fatal lookup error.
    pub fn log_probability_all(
        &self,
        values: &ParameterMap,
        exclude: &HashSet<String>,
    ) -> Result<f64> {
        let mut total = 0.0;
        for (name, parameter) in &self.parameters {
            if exclude.contains(name) {
                continue;
            }
            let value = values.get(name).ok_or_else(|| {
                Error::Lookup(format!("no value given for parameter '{}'", name))
            })?;
            total += parameter.prior.logpdf(*value);
        }
        Ok(total)
    }
}
