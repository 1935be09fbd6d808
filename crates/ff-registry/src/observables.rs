//! Observable references and the observable registry.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ff_core::{Error, Result};

use crate::couplings::Couplings;
use crate::parameters::ParameterMap;

/// A reference to an observable, optionally parameterized by positional
/// arguments (e.g. the edges of a kinematic bin).
///
/// A bare name is represented by empty `args`. Equality and hashing are
/// bit-exact on the arguments so references can key prediction maps.
#[derive(Debug, Clone)]
pub struct ObsRef {
    name: String,
    args: Vec<f64>,
}

impl ObsRef {
    /// Reference by bare name.
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: name.into(), args: Vec::new() }
    }

    /// Reference with positional arguments.
    pub fn with_args(name: impl Into<String>, args: impl Into<Vec<f64>>) -> Self {
        Self { name: name.into(), args: args.into() }
    }

    /// Observable name.
    pub fn observable(&self) -> &str {
        &self.name
    }

    /// Positional arguments.
    pub fn args(&self) -> &[f64] {
        &self.args
    }
}

impl PartialEq for ObsRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(&other.args)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for ObsRef {}

impl Hash for ObsRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        for a in &self.args {
            a.to_bits().hash(state);
        }
    }
}

impl fmt::Display for ObsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "{}({})", self.name, args.join(", "))
        }
    }
}

/// Prediction function of an observable: `(parameters, couplings, args) -> value`.
pub type PredictionFn = Rc<dyn Fn(&ParameterMap, &Couplings, &[f64]) -> Result<f64>>;

/// A named observable with its prediction function.
#[derive(Clone)]
pub struct Observable {
    name: String,
    prediction: PredictionFn,
}

impl Observable {
    /// Define an observable.
    pub fn new(name: impl Into<String>, prediction: PredictionFn) -> Self {
        Self { name: name.into(), prediction }
    }

    /// Observable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").field("name", &self.name).finish()
    }
}

/// Maps observable names to their prediction functions.
#[derive(Debug, Clone, Default)]
pub struct ObservableRegistry {
    observables: BTreeMap<String, Observable>,
}

impl ObservableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observable, replacing any previous definition.
    pub fn register(&mut self, observable: Observable) {
        self.observables.insert(observable.name().to_string(), observable);
    }

    /// Existence check by name.
    pub fn has(&self, name: &str) -> bool {
        self.observables.contains_key(name)
    }

    /// Evaluate the prediction for `obs` at the given parameter point and
    /// couplings. Unknown names are fatal lookup errors.
    pub fn predict(
        &self,
        obs: &ObsRef,
        parameters: &ParameterMap,
        couplings: &Couplings,
    ) -> Result<f64> {
        let inst = self
            .observables
            .get(obs.observable())
            .ok_or_else(|| Error::Lookup(format!("observable '{}' not found", obs)))?;
        (inst.prediction)(parameters, couplings, obs.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn registry_with_linear() -> ObservableRegistry {
        let mut reg = ObservableRegistry::new();
        reg.register(Observable::new(
            "BR",
            Rc::new(|pars: &ParameterMap, _wc: &Couplings, args: &[f64]| {
                let scale = args.first().copied().unwrap_or(1.0);
                Ok(scale * pars.get("m_b").copied().unwrap_or(0.0))
            }),
        ));
        reg
    }

    #[test]
    fn test_obsref_identity() {
        let a = ObsRef::with_args("BR", [1.0, 6.0]);
        let b = ObsRef::with_args("BR", [1.0, 6.0]);
        let c = ObsRef::with_args("BR", [1.0, 6.1]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ObsRef::name("BR"));

        let mut map = HashMap::new();
        map.insert(a.clone(), 1.0);
        assert_eq!(map.get(&b), Some(&1.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(ObsRef::name("BR").to_string(), "BR");
        assert_eq!(ObsRef::with_args("BR", [1.0, 6.0]).to_string(), "BR(1, 6)");
    }

    #[test]
    fn test_predict_with_args() {
        let reg = registry_with_linear();
        let mut pars = ParameterMap::new();
        pars.insert("m_b".into(), 4.2);
        let v = reg
            .predict(&ObsRef::with_args("BR", [2.0]), &pars, &Couplings::sm())
            .unwrap();
        assert_relative_eq!(v, 8.4, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_observable_fails() {
        let reg = registry_with_linear();
        let pars = ParameterMap::new();
        assert!(reg.predict(&ObsRef::name("nope"), &pars, &Couplings::sm()).is_err());
    }
}
