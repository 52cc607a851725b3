//! The per-candidate measurement pipeline.
//!
//! Everything that can go wrong between source assembly and verification is
//! absorbed here: the candidate becomes a `Failed` result with the `+∞`
//! sentinel and the search continues. Hard (schema/session) errors never
//! originate from this module.

use crate::registry::ArgumentRegistry;
use crate::result::RunStatus;
use crate::verify::{compare_outputs, ReferenceSnapshot};
use anyhow::{bail, ensure, Result};
use tuneforge_device::{CompileOutcome, Device, KernelId};
use tuneforge_space::{validate_ranges, Configuration, KernelSpace};

#[derive(Debug, Clone, Copy)]
pub(crate) struct MeasuredRun {
    pub time_ms: f64,
    pub threads: usize,
    pub status: RunStatus,
}

/// Measure one candidate configuration; never fails the search.
#[allow(clippy::too_many_arguments)]
pub(crate) fn measure_candidate<D: Device>(
    device: &mut D,
    kernel: &KernelSpace,
    config: &Configuration,
    registry: &ArgumentRegistry,
    num_runs: usize,
    snapshot: Option<&ReferenceSnapshot>,
    l2_threshold: f64,
) -> MeasuredRun {
    match try_measure(device, kernel, config, registry, num_runs, snapshot, l2_threshold) {
        Ok(run) => run,
        Err(error) => {
            tracing::warn!(kernel = kernel.name(), %config, error = %error, "candidate failed");
            MeasuredRun {
                time_ms: f64::INFINITY,
                threads: 0,
                status: RunStatus::Failed,
            }
        }
    }
}

/// Compile and launch the candidate, returning the timing reduction and
/// verification verdict. Used directly (with hard errors) for the reference
/// run as well.
pub(crate) fn try_measure<D: Device>(
    device: &mut D,
    kernel: &KernelSpace,
    config: &Configuration,
    registry: &ArgumentRegistry,
    num_runs: usize,
    snapshot: Option<&ReferenceSnapshot>,
    l2_threshold: f64,
) -> Result<MeasuredRun> {
    // Source assembly: the configuration's defines, then the kernel source.
    let source = format!("{}{}", config.defines(), kernel.source());

    let kernel_id = compile(device, &source, kernel.name())?;

    let (global, local) = kernel.compute_ranges(config)?;
    let info = device.info().clone();
    validate_ranges(&global, &local, &info)?;

    let local_memory = device.kernel_local_memory(kernel_id)?;
    ensure!(
        local_memory <= info.local_memory_bytes,
        "kernel uses {local_memory} bytes of local memory, device has {}",
        info.local_memory_bytes
    );

    registry.bind(device, kernel_id)?;
    registry.reset_outputs(device)?;

    // The timed part. Each launch is awaited before the next to keep the
    // device uncontended; the reduction is min-of-R, robust to warm-up noise.
    let mut time_ms = f64::INFINITY;
    for _ in 0..num_runs.max(1) {
        let event = device.enqueue_kernel(kernel_id, &global, &local)?;
        device.wait(event)?;
        time_ms = time_ms.min(device.elapsed_ms(event)?);
    }

    let status = match snapshot {
        Some(snapshot) => compare_outputs(device, registry, snapshot, l2_threshold)?,
        None => RunStatus::Ok,
    };

    Ok(MeasuredRun {
        time_ms,
        threads: local.iter().product(),
        status,
    })
}

fn compile<D: Device>(device: &mut D, source: &str, entry_point: &str) -> Result<KernelId> {
    match device.compile(source, entry_point)? {
        CompileOutcome::Success(id) => Ok(id),
        CompileOutcome::CompileError(log) => {
            tracing::warn!(entry_point, log = log.as_str(), "compiler error");
            bail!("compiler rejected the source")
        }
        CompileOutcome::InvalidBinary => bail!("toolchain produced an invalid binary"),
    }
}
