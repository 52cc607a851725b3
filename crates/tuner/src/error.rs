//! Hard errors surfaced by the session entrypoints.
//!
//! Per-candidate failures (compile errors, geometry violations, launch
//! failures) are soft: they never appear here, they become `Failed` results
//! with an infinite time and the search continues.

use std::path::PathBuf;
use thiserror::Error;
use tuneforge_space::SpaceError;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error("unknown kernel id {0}")]
    UnknownKernel(usize),

    #[error("the schema is frozen once tuning has started")]
    SchemaFrozen,

    #[error("search fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("initial temperature must be positive, got {0}")]
    InvalidTemperature(f64),

    #[error("swarm size must be at least 1")]
    EmptySwarm,

    #[error("could not read kernel source from `{path}`: {source}")]
    SourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reference run failed: {0}")]
    Reference(String),

    #[error("not enough measured results to train the surrogate model (have {got}, need {needed})")]
    InsufficientTrainingData { got: usize, needed: usize },

    #[error("device error: {0}")]
    Device(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<anyhow::Error> for TuneError {
    fn from(err: anyhow::Error) -> Self {
        TuneError::Device(err)
    }
}
