//! Surrogate cost models for TuneForge.
//!
//! After a search has measured a set of `(configuration, time)` pairs, a
//! surrogate model learns an approximate cost function, predicts the runtime
//! of every configuration in the valid enumeration, and the tuner re-measures
//! the most promising predictions on the device.

pub mod features;
pub mod linear_regression;

pub use features::FeatureTransform;
pub use linear_regression::{LinearRegression, SurrogateModel};
