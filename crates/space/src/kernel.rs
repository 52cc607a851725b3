//! Kernel descriptor: source, entry point, base geometry, transforms and the
//! tunable-parameter schema, plus the validated enumeration.

use crate::configuration::{Configuration, ConfigurationSet, Setting};
use crate::constraint::{Constraint, LocalMemoryModel};
use crate::error::SpaceError;
use crate::geometry::{apply_transform, validate_ranges, GeometryError, GeometryTransform, TransformKind};
use crate::parameter::Parameter;
use tuneforge_device::DeviceInfo;

/// Everything the tuner knows about one tunable kernel.
#[derive(Debug, Clone)]
pub struct KernelSpace {
    name: String,
    source: String,
    global_base: Vec<usize>,
    local_base: Vec<usize>,
    parameters: Vec<Parameter>,
    constraints: Vec<Constraint>,
    transforms: Vec<GeometryTransform>,
    local_memory: Option<LocalMemoryModel>,
}

impl KernelSpace {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<Self, SpaceError> {
        if global.is_empty() || global.len() > 3 || global.len() != local.len() {
            return Err(SpaceError::InvalidBaseGeometry {
                global: global.len(),
                local: local.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            source: source.into(),
            global_base: global,
            local_base: local,
            parameters: Vec::new(),
            constraints: Vec::new(),
            transforms: Vec::new(),
            local_memory: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn global_base(&self) -> &[usize] {
        &self.global_base
    }

    pub fn local_base(&self) -> &[usize] {
        &self.local_base
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    fn check_declared(&self, names: &[String]) -> Result<(), SpaceError> {
        for name in names {
            if self.parameter(name).is_none() {
                return Err(SpaceError::UnknownParameter { name: name.clone() });
            }
        }
        Ok(())
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        values: Vec<usize>,
    ) -> Result<(), SpaceError> {
        let name = name.into();
        if values.is_empty() {
            return Err(SpaceError::EmptyParameterValues { name });
        }
        if self.parameter(&name).is_some() {
            return Err(SpaceError::DuplicateParameter { name });
        }
        self.parameters.push(Parameter::new(name, values));
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), SpaceError> {
        self.check_declared(constraint.references())?;
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn add_transform(
        &mut self,
        kind: TransformKind,
        parameter: &str,
        axis: usize,
    ) -> Result<(), SpaceError> {
        if self.parameter(parameter).is_none() {
            return Err(SpaceError::UnknownParameter {
                name: parameter.to_string(),
            });
        }
        if axis >= self.global_base.len() {
            return Err(SpaceError::AxisOutOfRange {
                axis,
                dims: self.global_base.len(),
            });
        }
        self.transforms.push(GeometryTransform {
            kind,
            axis,
            parameter: parameter.to_string(),
        });
        Ok(())
    }

    pub fn set_local_memory(&mut self, model: LocalMemoryModel) -> Result<(), SpaceError> {
        self.check_declared(model.references())?;
        self.local_memory = Some(model);
        Ok(())
    }

    /// Local-memory bytes this configuration requires, if a formula is set.
    pub fn local_memory_bytes(&self, config: &Configuration) -> Option<usize> {
        let model = self.local_memory.as_ref()?;
        let values: Vec<usize> = model
            .references()
            .iter()
            .map(|name| config.get(name).unwrap_or(0))
            .collect();
        Some(model.bytes(&values))
    }

    /// Apply the transform list to the base geometry for this configuration.
    ///
    /// The returned `(global, local)` still has to pass
    /// [`validate_ranges`] against the device before launch.
    pub fn compute_ranges(
        &self,
        config: &Configuration,
    ) -> Result<(Vec<usize>, Vec<usize>), GeometryError> {
        let mut global = self.global_base.clone();
        let mut local = self.local_base.clone();
        for transform in &self.transforms {
            let value = config.get(&transform.parameter).unwrap_or(1);
            apply_transform(transform, value, &mut global, &mut local)?;
        }
        Ok((global, local))
    }

    /// Materialize the valid enumeration: the lexicographic cartesian product
    /// of all parameter value lists, with constraints evaluated in
    /// declaration order (first failure short-circuits) and geometry /
    /// local-memory pruning against the device limits.
    ///
    /// This is the definition-to-tuning transition; an empty result is a user
    /// error, not an empty tuning run.
    pub fn enumerate(&self, info: &DeviceInfo) -> Result<ConfigurationSet, SpaceError> {
        // Resolve constraint references to parameter positions once.
        let mut constraint_positions = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let positions: Vec<usize> = constraint
                .references()
                .iter()
                .map(|name| {
                    self.parameters
                        .iter()
                        .position(|p| p.name() == name)
                        .expect("constraint references are checked at registration")
                })
                .collect();
            constraint_positions.push(positions);
        }

        let mut configurations = Vec::new();
        let mut value_indices = Vec::new();
        let mut odometer = vec![0usize; self.parameters.len()];
        let mut values = vec![0usize; self.parameters.len()];

        'outer: loop {
            for (slot, (param, &index)) in values
                .iter_mut()
                .zip(self.parameters.iter().zip(odometer.iter()))
            {
                *slot = param.values()[index];
            }

            if self.satisfies_constraints(&values, &constraint_positions) {
                let config = Configuration::new(
                    self.parameters
                        .iter()
                        .zip(values.iter())
                        .map(|(p, &v)| Setting {
                            name: p.name().to_string(),
                            value: v,
                        })
                        .collect(),
                );
                if self.passes_device_limits(&config, info) {
                    configurations.push(config);
                    value_indices.push(odometer.clone());
                }
            }

            // Advance the odometer; the last-declared parameter varies
            // fastest, so the enumeration is lexicographic in declaration
            // order.
            for axis in (0..self.parameters.len()).rev() {
                odometer[axis] += 1;
                if odometer[axis] < self.parameters[axis].len() {
                    continue 'outer;
                }
                odometer[axis] = 0;
            }
            break;
        }

        if configurations.is_empty() {
            return Err(SpaceError::EmptyConfigurationSpace {
                kernel: self.name.clone(),
            });
        }
        Ok(ConfigurationSet::new(
            self.parameters.clone(),
            configurations,
            value_indices,
        ))
    }

    fn satisfies_constraints(&self, values: &[usize], constraint_positions: &[Vec<usize>]) -> bool {
        let mut scratch = Vec::new();
        for (constraint, positions) in self.constraints.iter().zip(constraint_positions) {
            scratch.clear();
            scratch.extend(positions.iter().map(|&p| values[p]));
            if !constraint.evaluate(&scratch) {
                return false;
            }
        }
        true
    }

    fn passes_device_limits(&self, config: &Configuration, info: &DeviceInfo) -> bool {
        let Ok((global, local)) = self.compute_ranges(config) else {
            return false;
        };
        if validate_ranges(&global, &local, info).is_err() {
            return false;
        }
        if let Some(bytes) = self.local_memory_bytes(config) {
            if bytes > info.local_memory_bytes {
                return false;
            }
        }
        true
    }
}
