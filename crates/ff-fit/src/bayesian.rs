//! Bayesian fit: posterior evaluation over the full parameter vector.

use std::collections::{HashMap, HashSet};

use ff_core::{Error, Result};
use ff_registry::parameters::ParameterMap;
use ff_registry::{Couplings, ObsRef};
use rand::Rng;

use crate::fit::Fit;
use crate::vector::{FitVector, VectorLayout};

/// A fit whose target density is likelihood × priors, as a pure function
/// of the flat vector `[fit_parameters | nuisance_parameters | couplings]`.
///
/// Instances can be fed directly to samplers: all methods are
/// deterministic given `x` apart from [`BayesianFit::random_point`].
pub struct BayesianFit {
    fit: Fit,
    layout: VectorLayout,
}

impl BayesianFit {
    /// Wrap a validated fit.
    pub fn new(fit: Fit) -> Self {
        let layout = VectorLayout::new(
            fit.fit_parameters().to_vec(),
            fit.nuisance_parameters().to_vec(),
            fit.coupling_names().to_vec(),
        );
        Self { fit, layout }
    }

    /// The underlying fit definition.
    pub fn fit(&self) -> &Fit {
        &self.fit
    }

    /// Length of the fit vector.
    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }

    /// Convert a flat vector into named groups.
    pub fn array_to_dict(&self, x: &[f64]) -> Result<FitVector> {
        self.layout.array_to_dict(x)
    }

    /// Convert named groups back into the flat vector.
    pub fn dict_to_array(&self, d: &FitVector) -> Result<Vec<f64>> {
        self.layout.dict_to_array(d)
    }

    /// A random starting point for samplers: prior draws for all fit and
    /// nuisance parameters and couplings.
    ///
    /// Fails when couplings are fit but no coupling priors were given.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        let mut out = self.fit.random_fit_parameters(rng);
        out.extend(self.fit.random_nuisance_parameters(rng));
        if !self.fit.coupling_names().is_empty() {
            let wc = self.fit.random_couplings(rng).ok_or_else(|| {
                Error::Configuration(
                    "cannot draw a random point: no coupling priors configured".into(),
                )
            })?;
            out.extend(wc);
        }
        Ok(out)
    }

    /// All registry parameters at their central values, overridden by the
    /// fit and nuisance values from `x`.
    pub fn get_parameter_dict(&self, x: &[f64]) -> Result<ParameterMap> {
        let d = self.layout.array_to_dict(x)?;
        let mut par = self.fit.central_parameter_map().clone();
        for (name, value) in d.fit_parameters.iter().chain(d.nuisance_parameters.iter()) {
            par.insert(name.to_string(), value);
        }
        Ok(par)
    }

    /// Couplings at `x`: the SM point when no couplings are fit, else a
    /// fresh coupling object initialized from the coupling function at the
    /// fit's input scale.
    pub fn get_couplings(&self, x: &[f64]) -> Result<Couplings> {
        couplings_at(&self.fit, &self.layout, x)
    }

    /// Sum of prior log-densities of the fit and nuisance parameters at
    /// `x`.
    ///
    /// Parameters not varied by this fit are excluded so their priors are
    /// not double-counted.
    pub fn log_prior_parameters(&self, x: &[f64]) -> Result<f64> {
        let par = self.get_parameter_dict(x)?;
        let varied: HashSet<&str> = self
            .fit
            .fit_parameters()
            .iter()
            .chain(self.fit.nuisance_parameters())
            .map(String::as_str)
            .collect();
        let exclude: HashSet<String> = self
            .fit
            .parameter_registry()
            .names()
            .filter(|n| !varied.contains(n))
            .map(str::to_string)
            .collect();
        self.fit.parameter_registry().log_probability_all(&par, &exclude)
    }

    /// Sum of prior log-densities of the coupling sub-vector, or zero when
    /// no coupling priors are configured.
    pub fn log_prior_couplings(&self, x: &[f64]) -> Result<f64> {
        let priors = match self.fit.coupling_priors() {
            None => return Ok(0.0),
            Some(p) => p.clone(),
        };
        let d = self.layout.array_to_dict(x)?;
        priors.log_probability_all(&d.couplings.to_map(), &HashSet::new())
    }

    /// Predictions for every fit observable at `x`.
    pub fn get_predictions(&self, x: &[f64]) -> Result<HashMap<ObsRef, f64>> {
        let par = self.get_parameter_dict(x)?;
        let wc = self.get_couplings(x)?;
        self.fit.predictions(&par, &wc)
    }

    /// Log-likelihood at `x`: summed joint log-density of all relevant
    /// measurements at the predictions, not including any prior.
    pub fn log_likelihood(&self, x: &[f64]) -> Result<f64> {
        let predictions = self.get_predictions(x)?;
        self.fit.summed_log_likelihood(&predictions, None)
    }

    /// Log of likelihood times prior.
    pub fn log_target(&self, x: &[f64]) -> Result<f64> {
        Ok(self.log_likelihood(x)?
            + self.log_prior_parameters(x)?
            + self.log_prior_couplings(x)?)
    }
}

/// Couplings at `x` under the given layout; shared with the fast fit.
pub(crate) fn couplings_at(fit: &Fit, layout: &VectorLayout, x: &[f64]) -> Result<Couplings> {
    if fit.coupling_names().is_empty() {
        return Ok(Couplings::sm());
    }
    let d = layout.array_to_dict(x)?;
    let f = fit.coupling_function().ok_or_else(|| {
        Error::Configuration("coupling_names given without a coupling function".into())
    })?;
    let values = f(&d.couplings)?;
    let mut wc = Couplings::sm();
    wc.set_initial(values, fit.input_scale());
    Ok(wc)
}
