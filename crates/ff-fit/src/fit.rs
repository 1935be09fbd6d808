//! Validated fit configuration and shared accessors.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ff_core::{Error, NamedValues, Result};
use ff_registry::{
    CouplingFn, Couplings, MeasurementRegistry, ObsRef, ObservableRegistry, ParameterRegistry,
};
use ff_registry::parameters::ParameterMap;
use rand::Rng;

/// Default input scale (in GeV) for coupling initialization.
pub const DEFAULT_INPUT_SCALE: f64 = 160.0;

/// Probe value used to validate the coupling function at construction.
const COUPLING_PROBE: f64 = 1e-6;

/// Configuration of a fit, consumed by [`Fit::new`].
#[derive(Clone, Default)]
pub struct FitConfig {
    /// Parameters of interest, varied freely in the fit vector.
    pub fit_parameters: Vec<String>,
    /// Parameters with existing priors, varied but not of direct interest.
    pub nuisance_parameters: Vec<String>,
    /// Observables entering the likelihood.
    pub observables: Vec<ObsRef>,
    /// Names of the free coupling parameters (may be empty).
    pub coupling_names: Vec<String>,
    /// Maps the coupling sub-vector to physical coupling values; required
    /// when `coupling_names` is non-empty.
    pub coupling_function: Option<CouplingFn>,
    /// Optional priors over `coupling_names`.
    pub coupling_priors: Option<Rc<ParameterRegistry>>,
    /// Energy scale for coupling initialization; zero means the default.
    pub input_scale: f64,
    /// Measurements to leave out. Mutually exclusive with `include_measurements`.
    pub exclude_measurements: Option<Vec<String>>,
    /// The only measurements to consider. Mutually exclusive with
    /// `exclude_measurements`.
    pub include_measurements: Option<Vec<String>>,
}

impl std::fmt::Debug for FitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitConfig")
            .field("fit_parameters", &self.fit_parameters)
            .field("nuisance_parameters", &self.nuisance_parameters)
            .field("observables", &self.observables)
            .field("coupling_names", &self.coupling_names)
            .field(
                "coupling_function",
                &self.coupling_function.as_ref().map(|_| "<fn>"),
            )
            .field("coupling_priors", &self.coupling_priors)
            .field("input_scale", &self.input_scale)
            .field("exclude_measurements", &self.exclude_measurements)
            .field("include_measurements", &self.include_measurements)
            .finish()
    }
}

/// A validated, immutable fit definition.
///
/// Construction performs all configuration checks eagerly; afterwards the
/// fit is read-only and can be held for the lifetime of an analysis
/// session. Registries are injected rather than resolved through ambient
/// state.
#[derive(Debug)]
pub struct Fit {
    name: String,
    parameters: Rc<ParameterRegistry>,
    observables: Rc<ObservableRegistry>,
    measurements: Rc<RefCell<MeasurementRegistry>>,
    config: FitConfig,
    parameters_central: ParameterMap,
    observable_set: HashSet<ObsRef>,
    observable_index: HashMap<ObsRef, usize>,
}

impl Fit {
    /// Validate a configuration against the given registries.
    ///
    /// Checks, in order: parameter names exist; observable references
    /// resolve; every observable is constrained by some measurement; the
    /// measurement filters are not both given; fit and nuisance parameters
    /// are disjoint; and, when couplings are fit, the coupling function
    /// accepts a probe value for every name.
    pub fn new(
        name: impl Into<String>,
        parameters: Rc<ParameterRegistry>,
        observables: Rc<ObservableRegistry>,
        measurements: Rc<RefCell<MeasurementRegistry>>,
        mut config: FitConfig,
    ) -> Result<Self> {
        let name = name.into();
        if config.input_scale == 0.0 {
            config.input_scale = DEFAULT_INPUT_SCALE;
        }

        for p in config.fit_parameters.iter().chain(&config.nuisance_parameters) {
            if !parameters.has(p) {
                return Err(Error::Configuration(format!(
                    "parameter '{}' not found in the parameter registry",
                    p
                )));
            }
        }

        for obs in &config.observables {
            if !observables.has(obs.observable()) {
                return Err(Error::Configuration(format!(
                    "observable '{}' not found in the observable registry",
                    obs
                )));
            }
        }

        let mut measured: HashSet<ObsRef> = HashSet::new();
        for m in measurements.borrow().iter() {
            measured.extend(m.all_observables());
        }
        let missing: Vec<String> = config
            .observables
            .iter()
            .filter(|o| !measured.contains(o))
            .map(|o| o.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::UnconstrainedObservable(missing));
        }

        if config.exclude_measurements.is_some() && config.include_measurements.is_some() {
            return Err(Error::Configuration(
                "exclude_measurements and include_measurements must not be given simultaneously"
                    .into(),
            ));
        }

        let fit_set: HashSet<&String> = config.fit_parameters.iter().collect();
        let overlap: Vec<&str> = config
            .nuisance_parameters
            .iter()
            .filter(|p| fit_set.contains(p))
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(Error::Configuration(format!(
                "parameters appearing as both fit and nuisance parameters: {}",
                overlap.join(", ")
            )));
        }

        if !config.coupling_names.is_empty() {
            let f = config.coupling_function.as_ref().ok_or_else(|| {
                Error::Configuration(
                    "coupling_names given without a coupling function".into(),
                )
            })?;
            let probe = NamedValues::from_pairs(
                config.coupling_names.iter().map(String::as_str),
                config.coupling_names.iter().map(|_| COUPLING_PROBE),
            )?;
            f(&probe).map_err(|e| {
                Error::Configuration(format!("error in calling the coupling function: {}", e))
            })?;
        }

        let parameters_central = parameters.central_all();
        let observable_set: HashSet<ObsRef> = config.observables.iter().cloned().collect();
        let observable_index: HashMap<ObsRef, usize> = config
            .observables
            .iter()
            .enumerate()
            .map(|(i, o)| (o.clone(), i))
            .collect();

        Ok(Self {
            name,
            parameters,
            observables,
            measurements,
            config,
            parameters_central,
            observable_set,
            observable_index,
        })
    }

    /// Fit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the parameters of interest.
    pub fn fit_parameters(&self) -> &[String] {
        &self.config.fit_parameters
    }

    /// Names of the nuisance parameters.
    pub fn nuisance_parameters(&self) -> &[String] {
        &self.config.nuisance_parameters
    }

    /// Observables entering the likelihood, in declaration order.
    pub fn observables(&self) -> &[ObsRef] {
        &self.config.observables
    }

    /// Names of the free coupling parameters.
    pub fn coupling_names(&self) -> &[String] {
        &self.config.coupling_names
    }

    /// Energy scale for coupling initialization.
    pub fn input_scale(&self) -> f64 {
        self.config.input_scale
    }

    /// The injected parameter registry.
    pub fn parameter_registry(&self) -> &ParameterRegistry {
        &self.parameters
    }

    /// The injected measurement registry.
    pub fn measurement_registry(&self) -> &Rc<RefCell<MeasurementRegistry>> {
        &self.measurements
    }

    pub(crate) fn coupling_function(&self) -> Option<&CouplingFn> {
        self.config.coupling_function.as_ref()
    }

    pub(crate) fn coupling_priors(&self) -> Option<&Rc<ParameterRegistry>> {
        self.config.coupling_priors.as_ref()
    }

    pub(crate) fn central_parameter_map(&self) -> &ParameterMap {
        &self.parameters_central
    }

    pub(crate) fn observable_position(&self, obs: &ObsRef) -> Option<usize> {
        self.observable_index.get(obs).copied()
    }

    /// Central values of the fit parameters, in declaration order.
    pub fn central_fit_parameters(&self) -> Vec<f64> {
        self.config
            .fit_parameters
            .iter()
            .map(|p| self.parameters_central[p])
            .collect()
    }

    /// Central values of the nuisance parameters, in declaration order.
    pub fn central_nuisance_parameters(&self) -> Vec<f64> {
        self.config
            .nuisance_parameters
            .iter()
            .map(|p| self.parameters_central[p])
            .collect()
    }

    /// One independent prior draw of the fit parameters.
    pub fn random_fit_parameters<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let all = self.parameters.sample_all(rng);
        self.config.fit_parameters.iter().map(|p| all[p]).collect()
    }

    /// One independent prior draw of the nuisance parameters.
    pub fn random_nuisance_parameters<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let all = self.parameters.sample_all(rng);
        self.config.nuisance_parameters.iter().map(|p| all[p]).collect()
    }

    /// One draw of the couplings from their priors, or `None` when no
    /// coupling priors were configured.
    pub fn random_couplings<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<f64>> {
        let priors = self.config.coupling_priors.as_ref()?;
        let all = priors.sample_all(rng);
        Some(
            self.config
                .coupling_names
                .iter()
                .map(|p| all.get(p).copied().unwrap_or(0.0))
                .collect(),
        )
    }

    /// Names of all measurements relevant to this fit: those constraining
    /// at least one fit observable, filtered by the exclude/include list.
    pub fn measurement_names(&self) -> Vec<String> {
        let registry = self.measurements.borrow();
        let mut names: Vec<String> = registry
            .iter()
            .filter(|m| {
                m.all_observables()
                    .iter()
                    .any(|o| self.observable_set.contains(o))
            })
            .map(|m| m.name().to_string())
            .collect();
        if let Some(exclude) = &self.config.exclude_measurements {
            names.retain(|n| !exclude.contains(n));
        } else if let Some(include) = &self.config.include_measurements {
            names.retain(|n| include.contains(n));
        }
        names
    }

    /// Predictions for every fit observable at the given parameter point
    /// and couplings, keyed by observable reference.
    pub fn predictions(
        &self,
        parameters: &ParameterMap,
        couplings: &Couplings,
    ) -> Result<HashMap<ObsRef, f64>> {
        let mut out = HashMap::with_capacity(self.config.observables.len());
        for obs in &self.config.observables {
            let value = self.observables.predict(obs, parameters, couplings)?;
            out.insert(obs.clone(), value);
        }
        Ok(out)
    }

    /// Sum of the joint log-densities of all relevant measurements at the
    /// given predictions, excluding per measurement any of its constrained
    /// observables outside this fit's observable set.
    ///
    /// With `pseudo_prefix = Some(prefix)` the pseudo-measurement named
    /// `<prefix><measurement>` is evaluated in place of each measurement.
    pub(crate) fn summed_log_likelihood(
        &self,
        predictions: &HashMap<ObsRef, f64>,
        pseudo_prefix: Option<&str>,
    ) -> Result<f64> {
        let registry = self.measurements.borrow();
        let mut total = 0.0;
        for m_name in self.measurement_names() {
            let measurement = match pseudo_prefix {
                None => registry.get(&m_name).ok_or_else(|| {
                    Error::Lookup(format!("measurement '{}' not found", m_name))
                })?,
                Some(prefix) => {
                    let pm_name = format!("{}{}", prefix, m_name);
                    registry.get_pseudo(&pm_name).ok_or_else(|| {
                        Error::Lookup(format!(
                            "pseudo-measurement '{}' not found; call make_measurement first",
                            pm_name
                        ))
                    })?
                }
            };
            let exclude: HashSet<ObsRef> = measurement
                .all_observables()
                .into_iter()
                .filter(|o| !self.observable_set.contains(o))
                .collect();
            total += measurement.log_probability_all(predictions, &exclude)?;
        }
        Ok(total)
    }
}


#[cfg(test)]
pub(crate) mod test_support {
    //! Toy registries shared across the fit-engine tests: one fit
    //! parameter `C`, one nuisance parameter `nu`, one observable `O`
    //! predicted as `C + nu + C9`, constrained by measurement `M`.

    use super::*;
    use ff_prob::{Distribution, Univariate};
    use ff_registry::{Measurement, Observable, Parameter};

    pub fn toy_registries_parts(
    ) -> (Rc<ParameterRegistry>, ObservableRegistry, Rc<RefCell<MeasurementRegistry>>) {
        let mut pars = ParameterRegistry::new();
        pars.define(Parameter::new("C", Univariate::normal(0.0, 1.0).unwrap()));
        pars.define(Parameter::new("nu", Univariate::normal(0.0, 0.3).unwrap()));

        let mut obs = ObservableRegistry::new();
        obs.register(Observable::new(
            "O",
            Rc::new(|pars: &ParameterMap, wc: &Couplings, _args: &[f64]| {
                Ok(pars["C"] + pars["nu"] + wc.value("C9"))
            }),
        ));

        let mut meas = MeasurementRegistry::new();
        let mut m = Measurement::new("M");
        m.add_constraint(
            vec![ObsRef::name("O")],
            Distribution::Univariate(Univariate::normal(1.0, 0.1).unwrap()),
        )
        .unwrap();
        meas.insert(m);

        (Rc::new(pars), obs, Rc::new(RefCell::new(meas)))
    }

    pub fn toy_registries(
    ) -> (Rc<ParameterRegistry>, Rc<ObservableRegistry>, Rc<RefCell<MeasurementRegistry>>) {
        let (pars, obs, meas) = toy_registries_parts();
        (pars, Rc::new(obs), meas)
    }

    pub fn toy_config() -> FitConfig {
        FitConfig {
            fit_parameters: vec!["C".into()],
            nuisance_parameters: vec!["nu".into()],
            observables: vec![ObsRef::name("O")],
            ..FitConfig::default()
        }
    }
}
