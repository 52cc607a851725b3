//! Configurations and the validated enumeration of a kernel space.

use crate::parameter::Parameter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One parameter assignment inside a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: usize,
}

/// A complete assignment of values to every parameter of one kernel, in
/// parameter declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    settings: Vec<Setting>,
}

impl Configuration {
    pub fn new(settings: Vec<Setting>) -> Self {
        Self { settings }
    }

    /// The configuration of a kernel without tunable parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.settings
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }

    /// Values in declaration order, e.g. as surrogate-model features.
    pub fn values(&self) -> impl Iterator<Item = usize> + '_ {
        self.settings.iter().map(|s| s.value)
    }

    /// The `#define NAME VALUE` block prepended to kernel source. This is the
    /// contract the kernel author codes against.
    pub fn defines(&self) -> String {
        let mut out = String::new();
        for setting in &self.settings {
            out.push_str("#define ");
            out.push_str(&setting.name);
            out.push(' ');
            out.push_str(&setting.value.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, setting) in self.settings.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", setting.name, setting.value)?;
        }
        Ok(())
    }
}

/// The validated, lexicographically ordered enumeration of a kernel space.
///
/// Built once by [`crate::KernelSpace::enumerate`]; the transition from the
/// definition phase to the tuning phase. Searchers address configurations by
/// enumeration index and by per-parameter value indices; `position` maps an
/// index vector back into the enumeration (or `None` if that combination was
/// pruned).
#[derive(Debug, Clone)]
pub struct ConfigurationSet {
    parameters: Vec<Parameter>,
    configurations: Vec<Configuration>,
    value_indices: Vec<Vec<usize>>,
    lookup: HashMap<Vec<usize>, usize>,
}

impl ConfigurationSet {
    pub(crate) fn new(
        parameters: Vec<Parameter>,
        configurations: Vec<Configuration>,
        value_indices: Vec<Vec<usize>>,
    ) -> Self {
        let lookup = value_indices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        Self {
            parameters,
            configurations,
            value_indices,
            lookup,
        }
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn configuration(&self, index: usize) -> &Configuration {
        &self.configurations[index]
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Per-parameter value indices of the configuration at `index`.
    pub fn value_indices(&self, index: usize) -> &[usize] {
        &self.value_indices[index]
    }

    /// Enumeration index of the configuration with the given value indices.
    pub fn position(&self, indices: &[usize]) -> Option<usize> {
        self.lookup.get(indices).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defines_block() {
        let config = Configuration::new(vec![
            Setting {
                name: "TILE_X".into(),
                value: 16,
            },
            Setting {
                name: "TILE_Y".into(),
                value: 8,
            },
        ]);
        assert_eq!(config.defines(), "#define TILE_X 16\n#define TILE_Y 8\n");
        assert_eq!(config.get("TILE_Y"), Some(8));
        assert_eq!(config.get("MISSING"), None);
    }

    #[test]
    fn test_empty_configuration() {
        let config = Configuration::empty();
        assert!(config.is_empty());
        assert_eq!(config.defines(), "");
    }
}
