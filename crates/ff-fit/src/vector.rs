//! Flat fit-vector layout and its structured counterpart.
//!
//! A fit point is a flat `&[f64]` partitioned as
//! `[fit_parameters | nuisance_parameters | couplings]`; the fast fit uses
//! the same machinery with an empty nuisance slot. The conversions here are
//! exact inverses on valid inputs.

use ff_core::{Error, NamedValues, Result};

/// A fit point in structured form: three named sub-maps in declaration
/// order.
#[derive(Debug, Clone)]
pub struct FitVector {
    /// Values of the parameters of interest.
    pub fit_parameters: NamedValues,
    /// Values of the nuisance parameters (empty in the fast fit).
    pub nuisance_parameters: NamedValues,
    /// Values of the free coupling parameters.
    pub couplings: NamedValues,
}

/// The ordered partitioning of the flat fit vector, built once at fit
/// construction.
#[derive(Debug, Clone)]
pub struct VectorLayout {
    fit_parameters: Vec<String>,
    nuisance_parameters: Vec<String>,
    couplings: Vec<String>,
}

impl VectorLayout {
    /// Build a layout from the three ordered name groups.
    pub fn new(
        fit_parameters: Vec<String>,
        nuisance_parameters: Vec<String>,
        couplings: Vec<String>,
    ) -> Self {
        Self { fit_parameters, nuisance_parameters, couplings }
    }

    /// Total vector length.
    pub fn dimension(&self) -> usize {
        self.fit_parameters.len() + self.nuisance_parameters.len() + self.couplings.len()
    }

    /// Convert a flat vector into its structured form.
    pub fn array_to_dict(&self, x: &[f64]) -> Result<FitVector> {
        if x.len() != self.dimension() {
            return Err(Error::Configuration(format!(
                "malformed vector: expected length {}, got {}",
                self.dimension(),
                x.len()
            )));
        }
        let n_fit = self.fit_parameters.len();
        let n_nui = self.nuisance_parameters.len();
        let fit_parameters = NamedValues::from_pairs(
            self.fit_parameters.iter().map(String::as_str),
            x[..n_fit].iter().copied(),
        )?;
        let nuisance_parameters = NamedValues::from_pairs(
            self.nuisance_parameters.iter().map(String::as_str),
            x[n_fit..n_fit + n_nui].iter().copied(),
        )?;
        let couplings = NamedValues::from_pairs(
            self.couplings.iter().map(String::as_str),
            x[n_fit + n_nui..].iter().copied(),
        )?;
        Ok(FitVector { fit_parameters, nuisance_parameters, couplings })
    }

    /// Convert a structured fit point back into the flat vector.
    ///
    /// A group missing one of the layout's names is a malformed
    /// dictionary; extra names are ignored.
    pub fn dict_to_array(&self, d: &FitVector) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.dimension());
        for (group, names) in [
            (&d.fit_parameters, &self.fit_parameters),
            (&d.nuisance_parameters, &self.nuisance_parameters),
            (&d.couplings, &self.couplings),
        ] {
            for name in names.iter() {
                out.push(group.get(name).ok_or_else(|| {
                    Error::Lookup(format!("malformed dictionary: missing value for '{}'", name))
                })?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layout() -> VectorLayout {
        VectorLayout::new(
            vec!["a".into(), "b".into()],
            vec!["n1".into()],
            vec!["w1".into(), "w2".into()],
        )
    }

    #[test]
    fn test_round_trip() {
        let layout = layout();
        let x = vec![0.1, -0.2, 3.0, 0.4, 0.5];
        let d = layout.array_to_dict(&x).unwrap();
        assert_relative_eq!(d.fit_parameters.get("b").unwrap(), -0.2);
        assert_relative_eq!(d.nuisance_parameters.get("n1").unwrap(), 3.0);
        assert_relative_eq!(d.couplings.get("w2").unwrap(), 0.5);
        let back = layout.dict_to_array(&d).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_wrong_length_fails() {
        let layout = layout();
        assert!(layout.array_to_dict(&[0.0; 4]).is_err());
        assert!(layout.array_to_dict(&[0.0; 6]).is_err());
    }

    #[test]
    fn test_missing_key_fails() {
        let layout = layout();
        let d = layout.array_to_dict(&[0.0; 5]).unwrap();
        let shorter = VectorLayout::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec!["n1".into()],
            vec![],
        );
        assert!(shorter.dict_to_array(&d).is_err());
    }

    #[test]
    fn test_empty_nuisance_slot() {
        let layout = VectorLayout::new(vec!["a".into()], vec![], vec!["w".into()]);
        assert_eq!(layout.dimension(), 2);
        let d = layout.array_to_dict(&[1.0, 2.0]).unwrap();
        assert!(d.nuisance_parameters.is_empty());
        assert_eq!(layout.dict_to_array(&d).unwrap(), vec![1.0, 2.0]);
    }
}
