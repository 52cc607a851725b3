//! TuneForge: an auto-tuner for data-parallel compute kernels.
//!
//! Given a kernel in a portable device language, a set of tunable
//! compile-time parameters, constraints between them, and a description of
//! how parameter values rescale the launch geometry, the tuner searches the
//! configuration space for the assignment that minimizes device execution
//! time while producing numerically correct output.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐    ┌────────────────┐    ┌───────────────────┐
//! │ Configuration  │───▶│ Searcher       │───▶│ Measurement       │
//! │ space + kernel │    │ (Full/Random/  │◀───│ pipeline          │
//! │ descriptor     │    │  Annealing/PSO)│    │ (compile→launch→  │
//! └────────────────┘    └────────────────┘    │  time→verify)     │
//!                                             └───────────────────┘
//! ```
//!
//! After the search, the optional surrogate phase trains a linear-regression
//! cost model on the measured results, ranks the whole enumeration by
//! predicted time, and re-measures the best predictions.
//!
//! # Key components
//!
//! - [`Tuner`]: the session API — definition phase, search, reports
//! - [`SessionConfig`] / [`SearchMethod`]: recognized session options
//! - [`TuningResult`] / [`TuningSummary`]: what a run produces
//! - [`verify::l2_difference`]: the output comparison primitive

pub mod error;
mod pipeline;
mod registry;
mod reports;
pub mod result;
mod search_driver;
pub mod session;
pub mod tuner;
pub mod verify;

pub use error::TuneError;
pub use result::{RunStatus, TuningResult, TuningSummary};
pub use session::{SearchMethod, SessionConfig, SurrogateConfig};
pub use tuner::Tuner;

// The collaborating crates' public vocabulary, re-exported for callers.
pub use tuneforge_device::{
    Complex32, Complex64, Device, DeviceInfo, ElementType, HostArray, LaunchRecord, MockDevice,
    ScalarValue,
};
pub use tuneforge_model::LinearRegression;
pub use tuneforge_space::{
    Configuration, Constraint, KernelSpace, LocalMemoryModel, Parameter, Setting, TransformKind,
};
