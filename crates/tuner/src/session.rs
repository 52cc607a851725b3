//! Session configuration: which device, which search strategy, how many
//! repeats, and the optional surrogate phase.

use crate::error::TuneError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The search strategy and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SearchMethod {
    /// Enumerate every valid configuration.
    Full,
    /// Uniformly sample a fraction of the valid configurations.
    Random { fraction: f64 },
    /// Simulated annealing with a linear temperature schedule.
    Annealing { fraction: f64, temperature: f64 },
    /// Particle-swarm optimization; coefficients are (inertia, cognitive,
    /// social) and typically sum to about 1.
    Pso {
        fraction: f64,
        swarm_size: usize,
        inertia: f64,
        cognitive: f64,
        social: f64,
    },
}

impl SearchMethod {
    pub fn validate(&self) -> Result<(), TuneError> {
        let fraction = match self {
            SearchMethod::Full => return Ok(()),
            SearchMethod::Random { fraction } => *fraction,
            SearchMethod::Annealing {
                fraction,
                temperature,
            } => {
                if *temperature <= 0.0 {
                    return Err(TuneError::InvalidTemperature(*temperature));
                }
                *fraction
            }
            SearchMethod::Pso {
                fraction,
                swarm_size,
                ..
            } => {
                if *swarm_size == 0 {
                    return Err(TuneError::EmptySwarm);
                }
                *fraction
            }
        };
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(TuneError::InvalidFraction(fraction));
        }
        Ok(())
    }
}

impl Default for SearchMethod {
    fn default() -> Self {
        SearchMethod::Full
    }
}

/// Optional post-search surrogate phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurrogateConfig {
    /// Trailing fraction of the measured results held out for validation.
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f32,
    /// How many top-ranked predictions to re-measure on the device.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            validation_fraction: default_validation_fraction(),
            top_k: default_top_k(),
        }
    }
}

/// Recognized session options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Index into the platform enumeration; consumed by device backends.
    #[serde(default)]
    pub platform_id: usize,
    /// Index into the device enumeration; consumed by device backends.
    #[serde(default)]
    pub device_id: usize,
    #[serde(default)]
    pub search_method: SearchMethod,
    /// Repeats per candidate; the reported time is the minimum.
    #[serde(default = "default_num_runs")]
    pub num_runs: usize,
    /// Verification tolerance on the per-buffer L2 norm.
    #[serde(default = "default_l2_threshold")]
    pub l2_threshold: f64,
    /// Seed for the randomized strategies; derived from the clock if absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub surrogate: Option<SurrogateConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform_id: 0,
            device_id: 0,
            search_method: SearchMethod::Full,
            num_runs: default_num_runs(),
            l2_threshold: default_l2_threshold(),
            seed: None,
            surrogate: None,
        }
    }
}

impl SessionConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TuneError> {
        let text = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TuneError> {
        self.search_method.validate()
    }
}

fn default_num_runs() -> usize {
    1
}

fn default_l2_threshold() -> f64 {
    1e-4
}

fn default_validation_fraction() -> f32 {
    0.20
}

fn default_top_k() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_sparse_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "search_method": { "method": "full" } }"#).unwrap();
        assert_eq!(config.num_runs, 1);
        assert_eq!(config.l2_threshold, 1e-4);
        assert!(config.surrogate.is_none());
    }

    #[test]
    fn test_method_roundtrip() {
        let method = SearchMethod::Pso {
            fraction: 0.25,
            swarm_size: 8,
            inertia: 0.4,
            cognitive: 0.3,
            social: 0.3,
        };
        let json = serde_json::to_string(&method).unwrap();
        let parsed: SearchMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(method, parsed);
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        assert!(SearchMethod::Random { fraction: 0.0 }.validate().is_err());
        assert!(SearchMethod::Random { fraction: 1.5 }.validate().is_err());
        assert!(SearchMethod::Annealing {
            fraction: 0.5,
            temperature: -1.0
        }
        .validate()
        .is_err());
        assert!(SearchMethod::Pso {
            fraction: 0.5,
            swarm_size: 0,
            inertia: 0.4,
            cognitive: 0.3,
            social: 0.3
        }
        .validate()
        .is_err());
        assert!(SearchMethod::Random { fraction: 1.0 }.validate().is_ok());
    }
}
