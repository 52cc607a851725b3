//! The argument registry: typed, ordered kernel arguments.
//!
//! Append-only; each added argument takes the next kernel position, so a
//! position can never be bound twice. The registry does not own the device
//! allocations, but it owns the reset policy: every output buffer gets a
//! reusable zero array at registration, written back before each launch.

use anyhow::Result;
use tuneforge_device::{BufferId, Device, ElementType, HostArray, KernelId, ScalarValue};

/// A buffer argument's device handle plus the type/length needed to move it
/// between host and device.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferBinding {
    pub buffer: BufferId,
    pub ty: ElementType,
    pub len: usize,
}

#[derive(Debug)]
enum Argument {
    Scalar(ScalarValue),
    Input(BufferBinding),
    Output { binding: BufferBinding, zeros: HostArray },
}

#[derive(Debug, Default)]
pub(crate) struct ArgumentRegistry {
    arguments: Vec<Argument>,
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scalar(&mut self, value: ScalarValue) -> usize {
        self.arguments.push(Argument::Scalar(value));
        self.arguments.len() - 1
    }

    pub fn add_input(&mut self, binding: BufferBinding) -> usize {
        self.arguments.push(Argument::Input(binding));
        self.arguments.len() - 1
    }

    pub fn add_output(&mut self, binding: BufferBinding) -> usize {
        let zeros = HostArray::zeros(binding.ty, binding.len);
        self.arguments.push(Argument::Output { binding, zeros });
        self.arguments.len() - 1
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Output bindings in argument order.
    pub fn outputs(&self) -> impl Iterator<Item = BufferBinding> + '_ {
        self.arguments.iter().filter_map(|arg| match arg {
            Argument::Output { binding, .. } => Some(*binding),
            _ => None,
        })
    }

    /// Bind every argument at its recorded position.
    pub fn bind<D: Device>(&self, device: &mut D, kernel: KernelId) -> Result<()> {
        for (index, argument) in self.arguments.iter().enumerate() {
            match argument {
                Argument::Scalar(value) => device.set_scalar_argument(kernel, index, *value)?,
                Argument::Input(binding) | Argument::Output { binding, .. } => {
                    device.set_buffer_argument(kernel, index, binding.buffer)?
                }
            }
        }
        Ok(())
    }

    /// Zero every output buffer, reusing the preallocated zero arrays.
    pub fn reset_outputs<D: Device>(&self, device: &mut D) -> Result<()> {
        for argument in &self.arguments {
            if let Argument::Output { binding, zeros } = argument {
                device.write_buffer(binding.buffer, zeros)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_device::{CompileOutcome, MockDevice};

    #[test]
    fn test_positions_follow_insertion_order() {
        let mut registry = ArgumentRegistry::new();
        assert_eq!(registry.add_scalar(ScalarValue::I32(5)), 0);
        let binding = BufferBinding {
            buffer: BufferId::from_raw(0),
            ty: ElementType::F32,
            len: 4,
        };
        assert_eq!(registry.add_input(binding), 1);
        assert_eq!(registry.add_output(binding), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.outputs().count(), 1);
    }

    #[test]
    fn test_reset_zeroes_only_outputs() {
        let mut device = MockDevice::new();
        let input = device
            .create_buffer(&HostArray::F32(vec![1.0, 2.0]))
            .unwrap();
        let output = device
            .create_buffer(&HostArray::F32(vec![3.0, 4.0]))
            .unwrap();

        let mut registry = ArgumentRegistry::new();
        registry.add_input(BufferBinding {
            buffer: input,
            ty: ElementType::F32,
            len: 2,
        });
        registry.add_output(BufferBinding {
            buffer: output,
            ty: ElementType::F32,
            len: 2,
        });

        registry.reset_outputs(&mut device).unwrap();
        assert_eq!(device.buffer(input), &HostArray::F32(vec![1.0, 2.0]));
        assert_eq!(device.buffer(output), &HostArray::F32(vec![0.0, 0.0]));
    }

    #[test]
    fn test_bind_sets_all_positions() {
        let mut device = MockDevice::new();
        let buffer = device.create_buffer(&HostArray::I32(vec![0; 4])).unwrap();
        let kernel = match device.compile("src", "k").unwrap() {
            CompileOutcome::Success(id) => id,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let mut registry = ArgumentRegistry::new();
        registry.add_output(BufferBinding {
            buffer,
            ty: ElementType::I32,
            len: 4,
        });
        registry.add_scalar(ScalarValue::F32(1.5));
        registry.bind(&mut device, kernel).unwrap();

        device.enqueue_kernel(kernel, &[4], &[1]).unwrap();
        assert_eq!(device.launches()[0].buffer_args, vec![(0, buffer)]);
    }
}
