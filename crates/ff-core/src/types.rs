//! Common data types for flavfit

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An ordered set of named real values.
///
/// Keeps parallel `(names, values)` sequences with a name index built once
/// at construction, so conversions between flat arrays and keyed access are
/// exact inverses and preserve declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedValues {
    names: Vec<String>,
    values: Vec<f64>,
    index: HashMap<String, usize>,
}

impl NamedValues {
    /// Create with all values set to zero.
    pub fn zeros<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        let values = vec![0.0; names.len()];
        Self { names, values, index }
    }

    /// Create from parallel name/value sequences.
    ///
    /// Fails if the lengths differ or a name is repeated.
    pub fn from_pairs<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        values: impl IntoIterator<Item = f64>,
    ) -> Result<Self> {
        let mut out = Self::zeros(names);
        let values: Vec<f64> = values.into_iter().collect();
        if values.len() != out.names.len() {
            return Err(Error::Configuration(format!(
                "expected {} values, got {}",
                out.names.len(),
                values.len()
            )));
        }
        if out.index.len() != out.names.len() {
            return Err(Error::Configuration("duplicate name in NamedValues".into()));
        }
        out.values = values;
        Ok(out)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordered names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Ordered values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    /// Set a value by name. Fails on unknown names.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        match self.index.get(name) {
            Some(&i) => {
                self.values[i] = value;
                Ok(())
            }
            None => Err(Error::Lookup(format!("name '{}' not found", name))),
        }
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    /// Copy into an unordered map.
    pub fn to_map(&self) -> HashMap<String, f64> {
        self.iter().map(|(n, v)| (n.to_string(), v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let nv = NamedValues::from_pairs(["b", "a", "c"], [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(nv.names(), &["b", "a", "c"]);
        assert_eq!(nv.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(nv.get("a"), Some(2.0));
    }

    #[test]
    fn test_set_unknown_fails() {
        let mut nv = NamedValues::zeros(["x"]);
        assert!(nv.set("y", 1.0).is_err());
        nv.set("x", 4.0).unwrap();
        assert_eq!(nv.get("x"), Some(4.0));
    }

    #[test]
    fn test_length_mismatch_fails() {
        assert!(NamedValues::from_pairs(["a", "b"], [1.0]).is_err());
    }

    #[test]
    fn test_duplicate_name_fails() {
        assert!(NamedValues::from_pairs(["a", "a"], [1.0, 2.0]).is_err());
    }
}
