//! Fast fit: nuisance parameters integrated out into pseudo-measurements.
//!
//! `make_measurement` estimates the covariance of Standard-Model
//! predictions under nuisance-parameter variation, convolves it with each
//! experimental constraint, and registers the result as a
//! pseudo-measurement. The likelihood then becomes cheap enough for dense
//! two-dimensional scans without sampling or profiling the remaining
//! dimensions.
//!
//! Two assumptions are inherited from this construction: theory
//! uncertainties are treated as Gaussian (experimental ones are kept
//! exact), and the theory uncertainty in the presence of new physics is
//! taken to be that of the SM.

use std::collections::HashMap;

use ff_core::{Error, Result};
use ff_prob::moments::{sample_covariance, sample_mean};
use ff_prob::{convolve, Distribution, MultivariateNormal, Univariate};
use ff_registry::parameters::ParameterMap;
use ff_registry::{Couplings, Measurement, ObsRef};
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::bayesian::couplings_at;
use crate::fit::Fit;
use crate::vector::{FitVector, VectorLayout};

/// Default number of nuisance-parameter draws for the theory covariance.
pub const DEFAULT_N_THEORY: usize = 100;

/// Default number of draws per measurement for the experimental
/// mean/covariance diagnostic.
pub const DEFAULT_N_EXPERIMENT: usize = 5000;

/// Divisor applied to the experimental support range when repairing an
/// exactly-zero diagonal entry of the theory covariance.
const DEGENERACY_SUPPORT_DIVISOR: f64 = 1e5;

/// A fit over `[fit_parameters | couplings]` with nuisance parameters
/// integrated out via the theory covariance.
///
/// [`FastFit::make_measurement`] must run once before
/// [`FastFit::log_likelihood`]; repeating it replaces the previously
/// registered pseudo-measurements.
pub struct FastFit {
    fit: Fit,
    layout: VectorLayout,
}

impl FastFit {
    /// Wrap a validated fit. The vector layout has no nuisance slot.
    pub fn new(fit: Fit) -> Self {
        let layout = VectorLayout::new(
            fit.fit_parameters().to_vec(),
            Vec::new(),
            fit.coupling_names().to_vec(),
        );
        Self { fit, layout }
    }

    /// The underlying fit definition.
    pub fn fit(&self) -> &Fit {
        &self.fit
    }

    /// Length of the fit vector (no nuisance term).
    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }

    /// Convert a flat vector into named groups (empty nuisance group).
    pub fn array_to_dict(&self, x: &[f64]) -> Result<FitVector> {
        self.layout.array_to_dict(x)
    }

    /// Convert named groups back into the flat vector.
    pub fn dict_to_array(&self, d: &FitVector) -> Result<Vec<f64>> {
        self.layout.dict_to_array(d)
    }

    /// All registry parameters at their central values, overridden by the
    /// fit-parameter values from `x`. Nuisance parameters stay central.
    pub fn get_parameter_dict(&self, x: &[f64]) -> Result<ParameterMap> {
        let d = self.layout.array_to_dict(x)?;
        let mut par = self.fit.central_parameter_map().clone();
        for (name, value) in d.fit_parameters.iter() {
            par.insert(name.to_string(), value);
        }
        Ok(par)
    }

    /// Couplings at `x` (SM when no couplings are fit).
    pub fn get_couplings(&self, x: &[f64]) -> Result<Couplings> {
        couplings_at(&self.fit, &self.layout, x)
    }

    /// Predictions for every fit observable at `x`.
    pub fn get_predictions(&self, x: &[f64]) -> Result<HashMap<ObsRef, f64>> {
        let par = self.get_parameter_dict(x)?;
        let wc = self.get_couplings(x)?;
        self.fit.predictions(&par, &wc)
    }

    /// Covariance of the SM predictions of all fit observables under
    /// `n_theory` random draws of the nuisance parameters (all other
    /// parameters at their central values).
    pub fn theory_covariance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n_theory: usize,
    ) -> Result<DMatrix<f64>> {
        let observables = self.fit.observables();
        let wc_sm = Couplings::sm();
        let mut pred = DMatrix::zeros(observables.len(), n_theory);
        for j in 0..n_theory {
            let draw = self.fit.parameter_registry().sample_all(rng);
            let mut par = self.fit.central_parameter_map().clone();
            for name in self.fit.nuisance_parameters() {
                par.insert(name.clone(), draw[name]);
            }
            let values = self.fit.predictions(&par, &wc_sm)?;
            for (i, obs) in observables.iter().enumerate() {
                pred[(i, j)] = values[obs];
            }
        }
        Ok(sample_covariance(&pred))
    }

    /// Produce one pseudo-measurement per relevant measurement, combining
    /// the experimental constraints with the theory uncertainty from
    /// `n_theory` nuisance draws, and register them under
    /// `<fit name><measurement name>` with replace semantics.
    pub fn make_measurement<R: Rng + ?Sized>(&self, rng: &mut R, n_theory: usize) -> Result<()> {
        let cov_sm = self.theory_covariance(rng, n_theory)?;
        for m_name in self.fit.measurement_names() {
            let measurement = self
                .fit
                .measurement_registry()
                .borrow()
                .get(&m_name)
                .cloned()
                .ok_or_else(|| Error::Lookup(format!("measurement '{}' not found", m_name)))?;

            let mut pm = Measurement::new(format!("{}{}", self.fit.name(), m_name));
            for block in measurement.constraints() {
                let ppos: Vec<usize> = block
                    .observables()
                    .iter()
                    .map(|o| {
                        self.fit.observable_position(o).ok_or_else(|| {
                            Error::Lookup(format!(
                                "observable '{}' constrained by measurement '{}' is not among the fit observables",
                                o, m_name
                            ))
                        })
                    })
                    .collect::<Result<_>>()?;
                let experimental = block.distribution();
                let theory = self.theory_constraint(&cov_sm, &ppos, experimental, &m_name)?;
                let combined = convolve(experimental, &theory)?;
                pm.add_constraint(block.observables().to_vec(), combined)?;
            }
            log::debug!(
                "registering pseudo-measurement '{}' ({} constraints)",
                pm.name(),
                pm.constraints().len()
            );
            self.fit.measurement_registry().borrow_mut().insert_pseudo(pm);
        }
        Ok(())
    }

    /// The Gaussian (or degenerate) theory-uncertainty distribution for one
    /// constraint block, from the theory-covariance submatrix at `ppos`.
    fn theory_constraint(
        &self,
        cov_sm: &DMatrix<f64>,
        ppos: &[usize],
        experimental: &Distribution,
        m_name: &str,
    ) -> Result<Distribution> {
        if ppos.len() == 1 {
            let var = cov_sm[(ppos[0], ppos[0])];
            if var < 0.0 {
                return Err(Error::Numerical(format!(
                    "negative theory variance {} for measurement '{}'",
                    var, m_name
                )));
            }
            let std = var.sqrt();
            if std == 0.0 {
                // exactly zero theory uncertainty: keep the constraint as-is
                Ok(Distribution::Univariate(Univariate::delta(experimental.central(0))))
            } else {
                Ok(Distribution::Univariate(Univariate::normal(
                    experimental.central(0),
                    std,
                )?))
            }
        } else {
            let k = ppos.len();
            let mut sub = DMatrix::from_fn(k, k, |i, j| cov_sm[(ppos[i], ppos[j])]);
            for i in 0..k {
                if sub[(i, i)] == 0.0 {
                    // Zero theory uncertainty in one dimension would make the
                    // covariance singular. Inject an uncertainty that is tiny
                    // on the scale of the experimental support; off-diagonal
                    // entries are left as computed.
                    let (lo, hi) = experimental.support(i);
                    let r = hi - lo;
                    sub[(i, i)] = (r / DEGENERACY_SUPPORT_DIVISOR).powi(2);
                    log::warn!(
                        "measurement '{}': zero theory variance along axis {}, replaced by {:e}",
                        m_name,
                        i,
                        sub[(i, i)]
                    );
                }
            }
            let mean = DVector::from_fn(k, |i, _| experimental.central(i));
            Ok(Distribution::Multivariate(MultivariateNormal::new(mean, sub)?))
        }
    }

    /// Log-likelihood at `x` against the registered pseudo-measurements.
    ///
    /// There is no prior term: nuisance parameters have been integrated
    /// out and priors for fit parameters are ignored. Fails with a lookup
    /// error if [`FastFit::make_measurement`] has not run.
    pub fn log_likelihood(&self, x: &[f64]) -> Result<f64> {
        let predictions = self.get_predictions(x)?;
        self.fit.summed_log_likelihood(&predictions, Some(self.fit.name()))
    }

    /// Experimental mean and covariance of the fit observables, estimated
    /// by sampling every relevant measurement `n_experiment` times.
    ///
    /// Measurements constraining overlapping observables are combined by
    /// precision weighting: the combined precision is the sum of the
    /// per-measurement precisions, and the combined mean is the combined
    /// covariance applied to the precision-weighted means. Observables a
    /// measurement does not constrain carry infinite variance (zero
    /// weight) for that measurement. This is a diagnostic; the fast-fit
    /// likelihood does not consume it.
    pub fn experimental_mean_covariance<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n_experiment: usize,
    ) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let n_obs = self.fit.observables().len();
        let m_names = self.fit.measurement_names();
        if m_names.is_empty() {
            return Err(Error::Configuration(
                "fit has no relevant measurements to combine".into(),
            ));
        }

        let mut stats: Vec<(DVector<f64>, DMatrix<f64>, Vec<usize>)> = Vec::new();
        for m_name in &m_names {
            let measurement = self
                .fit
                .measurement_registry()
                .borrow()
                .get(m_name)
                .cloned()
                .ok_or_else(|| Error::Lookup(format!("measurement '{}' not found", m_name)))?;
            let mut touched: Vec<usize> = measurement
                .all_observables()
                .iter()
                .filter_map(|o| self.fit.observable_position(o))
                .collect();
            touched.sort_unstable();

            let mut samples = DMatrix::zeros(n_obs, n_experiment);
            for j in 0..n_experiment {
                let draw = measurement.sample_all(rng)?;
                for (obs, value) in &draw {
                    if let Some(i) = self.fit.observable_position(obs) {
                        samples[(i, j)] = *value;
                    }
                }
            }
            let mean = sample_mean(&samples);
            let mut cov = sample_covariance(&samples);
            for i in 0..n_obs {
                if !touched.contains(&i) {
                    for j in 0..n_obs {
                        cov[(i, j)] = 0.0;
                        cov[(j, i)] = 0.0;
                    }
                    cov[(i, i)] = f64::INFINITY;
                }
            }
            stats.push((mean, cov, touched));
        }

        if stats.len() == 1 {
            let (mean, cov, _) = stats.remove(0);
            return Ok((mean, cov));
        }

        let mut total_precision = DMatrix::zeros(n_obs, n_obs);
        let mut weighted_sum = DVector::zeros(n_obs);
        for (mean, cov, touched) in &stats {
            let precision = embedded_precision(cov, touched, n_obs)?;
            weighted_sum += &precision * mean;
            total_precision += precision;
        }
        let combined_cov = total_precision.try_inverse().ok_or_else(|| {
            Error::Numerical("singular combined precision in weighted covariance combination".into())
        })?;
        let combined_mean = &combined_cov * weighted_sum;
        Ok((combined_mean, combined_cov))
    }
}

/// Precision (inverse covariance) of the touched-observable submatrix,
/// embedded into the full observable space with zero weight elsewhere.
fn embedded_precision(
    cov: &DMatrix<f64>,
    touched: &[usize],
    n_obs: usize,
) -> Result<DMatrix<f64>> {
    let k = touched.len();
    let sub = DMatrix::from_fn(k, k, |i, j| cov[(touched[i], touched[j])]);
    let inv = sub.try_inverse().ok_or_else(|| {
        Error::Numerical("singular covariance matrix in weighted combination".into())
    })?;
    let mut out = DMatrix::zeros(n_obs, n_obs);
    for i in 0..k {
        for j in 0..k {
            out[(touched[i], touched[j])] = inv[(i, j)];
        }
    }
    Ok(out)
}
