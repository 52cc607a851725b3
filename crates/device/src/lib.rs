//! Device abstraction for the TuneForge auto-tuner.
//!
//! The tuning core never talks to a device API directly; it drives the
//! [`Device`] trait, which hides platform handles behind opaque ids. A real
//! backend (the `cuda` feature) compiles source with the device toolchain and
//! launches on hardware; [`MockDevice`] records launches and replays scripted
//! timings so the core can be tested on any host.

pub mod mock;
pub mod types;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use mock::{LaunchRecord, MockDevice};
pub use types::{
    BufferId, CompileOutcome, Complex32, Complex64, DeviceInfo, ElementType, EventId, HostArray,
    KernelId, ScalarValue,
};

use anyhow::Result;

/// The operations the tuning core requires from a device.
///
/// The coordinator is single-threaded and sequential; every `wait` call is a
/// blocking suspension. Implementations are free to execute launches
/// asynchronously between `enqueue_kernel` and `wait`.
pub trait Device {
    /// Static device properties, queried once and cached by the caller.
    fn info(&self) -> &DeviceInfo;

    /// Submit assembled source to the toolchain. Toolchain diagnostics are
    /// part of the [`CompileOutcome`]; an `Err` means the device API itself
    /// failed.
    fn compile(&mut self, source: &str, entry_point: &str) -> Result<CompileOutcome>;

    /// Local-memory bytes used by a compiled kernel.
    fn kernel_local_memory(&mut self, kernel: KernelId) -> Result<usize>;

    /// Allocate a device buffer and upload the initial contents.
    fn create_buffer(&mut self, initial: &HostArray) -> Result<BufferId>;

    /// Overwrite a device buffer with host data of the same type and length.
    fn write_buffer(&mut self, buffer: BufferId, data: &HostArray) -> Result<()>;

    /// Download a device buffer into a typed host array.
    fn read_buffer(&mut self, buffer: BufferId, ty: ElementType, len: usize) -> Result<HostArray>;

    fn set_scalar_argument(
        &mut self,
        kernel: KernelId,
        index: usize,
        value: ScalarValue,
    ) -> Result<()>;

    fn set_buffer_argument(&mut self, kernel: KernelId, index: usize, buffer: BufferId)
        -> Result<()>;

    /// Enqueue one launch with the given geometry; returns the event to wait
    /// on and to read profiling time from.
    fn enqueue_kernel(&mut self, kernel: KernelId, global: &[usize], local: &[usize])
        -> Result<EventId>;

    /// Block until the event has completed.
    fn wait(&mut self, event: EventId) -> Result<()>;

    /// Device-side elapsed time of a completed event, in milliseconds.
    fn elapsed_ms(&mut self, event: EventId) -> Result<f64>;
}
