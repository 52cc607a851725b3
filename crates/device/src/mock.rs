//! A scripted in-memory device for testing the tuning core.
//!
//! The mock records every launch instead of executing anything. Tests control
//! what it reports: per-launch times (a queue or a function of the launch),
//! compile failures keyed on source markers, kernel local-memory usage, and
//! an effect that writes output buffers so verification paths can be
//! exercised end to end.

use crate::types::{
    BufferId, CompileOutcome, DeviceInfo, ElementType, EventId, HostArray, KernelId, ScalarValue,
};
use crate::Device;
use anyhow::{anyhow, ensure, Result};
use std::collections::{BTreeMap, VecDeque};

/// Everything the mock knows about one enqueued launch.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub kernel: KernelId,
    pub entry_point: String,
    /// `#define NAME VALUE` lines parsed from the compiled source, i.e. the
    /// configuration under test.
    pub defines: BTreeMap<String, usize>,
    pub global: Vec<usize>,
    pub local: Vec<usize>,
    /// Buffer bindings at launch time, as `(argument index, buffer)` pairs.
    pub buffer_args: Vec<(usize, BufferId)>,
}

#[derive(Debug, Clone)]
enum MockArg {
    Scalar(ScalarValue),
    Buffer(BufferId),
}

struct MockProgram {
    entry_point: String,
    defines: BTreeMap<String, usize>,
    local_memory: usize,
    args: BTreeMap<usize, MockArg>,
}

type TimeFn = Box<dyn Fn(&LaunchRecord) -> f64>;
type LaunchEffect = Box<dyn FnMut(&LaunchRecord, &mut [HostArray])>;

pub struct MockDevice {
    info: DeviceInfo,
    programs: Vec<MockProgram>,
    buffers: Vec<HostArray>,
    launches: Vec<LaunchRecord>,
    events: Vec<f64>,
    queued_times: VecDeque<f64>,
    time_fn: Option<TimeFn>,
    launch_effect: Option<LaunchEffect>,
    compile_error_marker: Option<String>,
    invalid_binary_marker: Option<String>,
    kernel_local_memory: usize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_info(DeviceInfo::unbounded("mock"))
    }

    pub fn with_info(info: DeviceInfo) -> Self {
        Self {
            info,
            programs: Vec::new(),
            buffers: Vec::new(),
            launches: Vec::new(),
            events: Vec::new(),
            queued_times: VecDeque::new(),
            time_fn: None,
            launch_effect: None,
            compile_error_marker: None,
            invalid_binary_marker: None,
            kernel_local_memory: 0,
        }
    }

    /// Times handed out for the next launches, in order. Takes precedence
    /// over the time function.
    pub fn queue_times(&mut self, times: &[f64]) {
        self.queued_times.extend(times.iter().copied());
    }

    /// Derive the reported time from the launch itself (e.g. from a define).
    pub fn set_time_fn(&mut self, f: impl Fn(&LaunchRecord) -> f64 + 'static) {
        self.time_fn = Some(Box::new(f));
    }

    /// Run on every launch with mutable access to all buffers, emulating what
    /// the kernel would write.
    pub fn set_launch_effect(&mut self, f: impl FnMut(&LaunchRecord, &mut [HostArray]) + 'static) {
        self.launch_effect = Some(Box::new(f));
    }

    /// Sources containing `marker` fail compilation with a build log.
    pub fn fail_compiles_containing(&mut self, marker: &str) {
        self.compile_error_marker = Some(marker.to_string());
    }

    /// Sources containing `marker` produce an unusable binary.
    pub fn invalid_binary_containing(&mut self, marker: &str) {
        self.invalid_binary_marker = Some(marker.to_string());
    }

    /// Local-memory bytes reported for every kernel compiled afterwards.
    pub fn set_kernel_local_memory(&mut self, bytes: usize) {
        self.kernel_local_memory = bytes;
    }

    pub fn launches(&self) -> &[LaunchRecord] {
        &self.launches
    }

    pub fn buffer(&self, id: BufferId) -> &HostArray {
        &self.buffers[id.raw()]
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> &mut HostArray {
        &mut self.buffers[id.raw()]
    }

    fn parse_defines(source: &str) -> BTreeMap<String, usize> {
        let mut defines = BTreeMap::new();
        for line in source.lines() {
            let Some(rest) = line.strip_prefix("#define ") else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
                if let Ok(value) = value.parse::<usize>() {
                    defines.insert(name.to_string(), value);
                }
            }
        }
        defines
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for MockDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn compile(&mut self, source: &str, entry_point: &str) -> Result<CompileOutcome> {
        if let Some(marker) = &self.compile_error_marker {
            if source.contains(marker.as_str()) {
                return Ok(CompileOutcome::CompileError(format!(
                    "mock build log: source contains `{marker}`"
                )));
            }
        }
        if let Some(marker) = &self.invalid_binary_marker {
            if source.contains(marker.as_str()) {
                return Ok(CompileOutcome::InvalidBinary);
            }
        }
        let id = KernelId::from_raw(self.programs.len());
        self.programs.push(MockProgram {
            entry_point: entry_point.to_string(),
            defines: Self::parse_defines(source),
            local_memory: self.kernel_local_memory,
            args: BTreeMap::new(),
        });
        Ok(CompileOutcome::Success(id))
    }

    fn kernel_local_memory(&mut self, kernel: KernelId) -> Result<usize> {
        let program = self
            .programs
            .get(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel {kernel:?}"))?;
        Ok(program.local_memory)
    }

    fn create_buffer(&mut self, initial: &HostArray) -> Result<BufferId> {
        let id = BufferId::from_raw(self.buffers.len());
        self.buffers.push(initial.clone());
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &HostArray) -> Result<()> {
        let slot = self
            .buffers
            .get_mut(buffer.raw())
            .ok_or_else(|| anyhow!("unknown buffer {buffer:?}"))?;
        ensure!(
            slot.element_type() == data.element_type() && slot.len() == data.len(),
            "buffer write shape mismatch"
        );
        *slot = data.clone();
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId, ty: ElementType, len: usize) -> Result<HostArray> {
        let slot = self
            .buffers
            .get(buffer.raw())
            .ok_or_else(|| anyhow!("unknown buffer {buffer:?}"))?;
        ensure!(
            slot.element_type() == ty && slot.len() == len,
            "buffer read shape mismatch"
        );
        Ok(slot.clone())
    }

    fn set_scalar_argument(
        &mut self,
        kernel: KernelId,
        index: usize,
        value: ScalarValue,
    ) -> Result<()> {
        let program = self
            .programs
            .get_mut(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel {kernel:?}"))?;
        program.args.insert(index, MockArg::Scalar(value));
        Ok(())
    }

    fn set_buffer_argument(
        &mut self,
        kernel: KernelId,
        index: usize,
        buffer: BufferId,
    ) -> Result<()> {
        let program = self
            .programs
            .get_mut(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel {kernel:?}"))?;
        program.args.insert(index, MockArg::Buffer(buffer));
        Ok(())
    }

    fn enqueue_kernel(
        &mut self,
        kernel: KernelId,
        global: &[usize],
        local: &[usize],
    ) -> Result<EventId> {
        let program = self
            .programs
            .get(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel {kernel:?}"))?;
        let record = LaunchRecord {
            kernel,
            entry_point: program.entry_point.clone(),
            defines: program.defines.clone(),
            global: global.to_vec(),
            local: local.to_vec(),
            buffer_args: program
                .args
                .iter()
                .filter_map(|(index, arg)| match arg {
                    MockArg::Buffer(id) => Some((*index, *id)),
                    MockArg::Scalar(_) => None,
                })
                .collect(),
        };
        if let Some(effect) = self.launch_effect.as_mut() {
            effect(&record, &mut self.buffers);
        }
        let time = self
            .queued_times
            .pop_front()
            .or_else(|| self.time_fn.as_ref().map(|f| f(&record)))
            .unwrap_or(1.0);
        let event = EventId::from_raw(self.events.len());
        self.events.push(time);
        self.launches.push(record);
        Ok(event)
    }

    fn wait(&mut self, event: EventId) -> Result<()> {
        ensure!(event.raw() < self.events.len(), "unknown event {event:?}");
        Ok(())
    }

    fn elapsed_ms(&mut self, event: EventId) -> Result<f64> {
        self.events
            .get(event.raw())
            .copied()
            .ok_or_else(|| anyhow!("unknown event {event:?}"))
    }
}
