//! Reference snapshots and L2 output verification.

use crate::registry::ArgumentRegistry;
use crate::result::RunStatus;
use anyhow::Result;
use tuneforge_device::{Device, HostArray};

/// One-time host copy of the reference kernel's output buffers, written once
/// before tuning starts and read-only thereafter.
#[derive(Debug)]
pub(crate) struct ReferenceSnapshot {
    outputs: Vec<HostArray>,
}

impl ReferenceSnapshot {
    /// Download every output buffer after the reference run.
    pub fn capture<D: Device>(device: &mut D, registry: &ArgumentRegistry) -> Result<Self> {
        let mut outputs = Vec::new();
        for binding in registry.outputs() {
            outputs.push(device.read_buffer(binding.buffer, binding.ty, binding.len)?);
        }
        Ok(Self { outputs })
    }

    pub fn outputs(&self) -> &[HostArray] {
        &self.outputs
    }
}

/// Sum of absolute element-wise differences, widened to `f64`. Complex
/// elements contribute `|Δre| + |Δim|`. A shape mismatch yields NaN, which
/// the verdict treats as a mismatch.
pub fn l2_difference(reference: &HostArray, candidate: &HostArray) -> f64 {
    if reference.len() != candidate.len() {
        return f64::NAN;
    }
    match (reference, candidate) {
        (HostArray::I32(a), HostArray::I32(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs())
            .sum(),
        (HostArray::U64(a), HostArray::U64(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| (*x as f64 - *y as f64).abs())
            .sum(),
        (HostArray::F32(a), HostArray::F32(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs())
            .sum(),
        (HostArray::F64(a), HostArray::F64(b)) => {
            a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
        }
        (HostArray::CF32(a), HostArray::CF32(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                (f64::from(x.re) - f64::from(y.re)).abs()
                    + (f64::from(x.im) - f64::from(y.im)).abs()
            })
            .sum(),
        (HostArray::CF64(a), HostArray::CF64(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x.re - y.re).abs() + (x.im - y.im).abs())
            .sum(),
        _ => f64::NAN,
    }
}

/// Download every output buffer and compare against the snapshot. `Ok` iff
/// every per-buffer L2 norm is finite and within the threshold.
pub(crate) fn compare_outputs<D: Device>(
    device: &mut D,
    registry: &ArgumentRegistry,
    snapshot: &ReferenceSnapshot,
    l2_threshold: f64,
) -> Result<RunStatus> {
    for (binding, reference) in registry.outputs().zip(snapshot.outputs()) {
        let candidate = device.read_buffer(binding.buffer, binding.ty, binding.len)?;
        let l2 = l2_difference(reference, &candidate);
        if l2.is_nan() || l2 > l2_threshold {
            tracing::warn!(l2, threshold = l2_threshold, "results differ from reference");
            return Ok(RunStatus::Mismatch);
        }
    }
    Ok(RunStatus::Ok)
}
