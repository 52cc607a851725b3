//! Tunable parameters.

use serde::{Deserialize, Serialize};

/// A named tunable with a finite ordered list of integer values.
///
/// The order of the value list is a presentation convention; semantically the
/// list is a set. Searchers that walk parameters in value-index space
/// (annealing neighbors, PSO velocities) index into this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    values: Vec<usize>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, values: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[usize] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
