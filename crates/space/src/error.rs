//! Schema errors raised while defining or enumerating a kernel space.

use thiserror::Error;

/// Hard errors: the schema itself is wrong and the session cannot proceed.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("parameter `{name}` has an empty value list")]
    EmptyParameterValues { name: String },

    #[error("parameter `{name}` is already declared")]
    DuplicateParameter { name: String },

    #[error("reference to undeclared parameter `{name}`")]
    UnknownParameter { name: String },

    #[error("base geometry must have 1-3 axes and matching global/local ranks, got {global} global and {local} local")]
    InvalidBaseGeometry { global: usize, local: usize },

    #[error("axis {axis} is out of range for a {dims}-dimensional kernel")]
    AxisOutOfRange { axis: usize, dims: usize },

    #[error("no configuration of kernel `{kernel}` satisfies the constraints and device limits")]
    EmptyConfigurationSpace { kernel: String },
}
