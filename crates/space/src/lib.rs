//! Configuration-space model for the TuneForge auto-tuner.
//!
//! A kernel's tunable schema is built up during a definition phase:
//! parameters with finite value lists, constraints between them, geometry
//! transforms, and an optional local-memory formula. `KernelSpace::enumerate`
//! materializes the valid configurations — the cartesian product filtered by
//! constraints and pruned against device limits — and freezes the schema for
//! the tuning phase.

pub mod configuration;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod kernel;
pub mod parameter;

pub use configuration::{Configuration, ConfigurationSet, Setting};
pub use constraint::{Constraint, ConstraintFn, LocalMemoryModel};
pub use error::SpaceError;
pub use geometry::{validate_ranges, GeometryError, GeometryTransform, TransformKind};
pub use kernel::KernelSpace;
pub use parameter::Parameter;
