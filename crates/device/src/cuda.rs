//! CUDA backend: NVRTC runtime compilation plus driver-API launches.
//!
//! Kernel sources are C dialect, so the `#define NAME VALUE` lines the tuner
//! prepends are consumed by the NVRTC preprocessor directly. Launch geometry
//! arrives in flat (global, local) form; the grid dimension is the quotient,
//! which the tuner has already validated to divide exactly.
//!
//! Argument lists are dynamic (the tuner binds them by position), so launches
//! go through `cuLaunchKernel` with a parameter pointer array rather than the
//! tuple-based safe wrapper. Timing uses CUDA events on the null stream.

use crate::types::{
    BufferId, CompileOutcome, DeviceInfo, ElementType, EventId, HostArray, KernelId, ScalarValue,
};
use crate::Device;
use anyhow::{anyhow, bail, ensure, Context, Result};
use cudarc::driver::sys::{self, CUdevice_attribute, CUresult};
use cudarc::driver::{CudaDevice, CudaSlice, DevicePtr};
use cudarc::nvrtc::{compile_ptx_with_opts, CompileOptions};
use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::sync::Arc;

fn check(result: CUresult, what: &str) -> Result<()> {
    if result == CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        Err(anyhow!("{what} failed: {result:?}"))
    }
}

enum DeviceBuffer {
    I32(CudaSlice<i32>),
    U64(CudaSlice<u64>),
    F32(CudaSlice<f32>),
    F64(CudaSlice<f64>),
    // Complex values travel as interleaved scalar pairs.
    CF32(CudaSlice<f32>),
    CF64(CudaSlice<f64>),
}

impl DeviceBuffer {
    fn device_ptr(&self) -> u64 {
        match self {
            DeviceBuffer::I32(s) => *s.device_ptr(),
            DeviceBuffer::U64(s) => *s.device_ptr(),
            DeviceBuffer::F32(s) | DeviceBuffer::CF32(s) => *s.device_ptr(),
            DeviceBuffer::F64(s) | DeviceBuffer::CF64(s) => *s.device_ptr(),
        }
    }
}

#[derive(Clone, Copy)]
enum CudaArg {
    Scalar(ScalarValue),
    Buffer(BufferId),
}

struct CudaKernel {
    function: sys::CUfunction,
    args: BTreeMap<usize, CudaArg>,
}

struct CudaEventPair {
    start: sys::CUevent,
    end: sys::CUevent,
}

/// A [`Device`] implementation backed by one CUDA device.
pub struct CudaDeviceApi {
    device: Arc<CudaDevice>,
    info: DeviceInfo,
    arch: &'static str,
    kernels: Vec<CudaKernel>,
    buffers: Vec<DeviceBuffer>,
    events: Vec<CudaEventPair>,
}

impl CudaDeviceApi {
    /// Open the CUDA device with the given ordinal.
    pub fn new(ordinal: usize) -> Result<Self> {
        let device = CudaDevice::new(ordinal).context("CUDA device initialization")?;

        let attr = |a: CUdevice_attribute| -> Result<usize> {
            Ok(device.attribute(a).context("device attribute query")? as usize)
        };
        let max_x = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X)?;
        let max_y = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y)?;
        let max_z = attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z)?;
        let info = DeviceInfo {
            name: device.name().context("device name query")?,
            version: {
                let mut driver = 0i32;
                unsafe { check(sys::lib().cuDriverGetVersion(&mut driver), "cuDriverGetVersion")? };
                format!("CUDA driver {}.{}", driver / 1000, (driver % 1000) / 10)
            },
            max_work_group_size: attr(
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK,
            )?,
            max_work_item_dimensions: 3,
            max_work_item_sizes: [max_x, max_y, max_z],
            local_memory_bytes: attr(
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK,
            )?,
        };

        let major =
            attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor =
            attr(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;
        // load_ptx and the compile options want 'static names.
        let arch: &'static str = Box::leak(format!("compute_{major}{minor}").into_boxed_str());

        Ok(Self {
            device,
            info,
            arch,
            kernels: Vec::new(),
            buffers: Vec::new(),
            events: Vec::new(),
        })
    }

    fn kernel(&self, id: KernelId) -> Result<&CudaKernel> {
        self.kernels
            .get(id.raw())
            .ok_or_else(|| anyhow!("unknown kernel {id:?}"))
    }
}

impl Device for CudaDeviceApi {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn compile(&mut self, source: &str, entry_point: &str) -> Result<CompileOutcome> {
        let opts = CompileOptions {
            arch: Some(self.arch),
            ..Default::default()
        };
        let ptx = match compile_ptx_with_opts(source, opts) {
            Ok(ptx) => ptx,
            Err(e) => return Ok(CompileOutcome::CompileError(format!("{e:?}"))),
        };

        let ptx_src = CString::new(ptx.to_src()).context("PTX contains interior NUL")?;
        let name = CString::new(entry_point).context("entry point contains interior NUL")?;
        let mut module: sys::CUmodule = std::ptr::null_mut();
        let mut function: sys::CUfunction = std::ptr::null_mut();
        unsafe {
            let lib = sys::lib();
            if lib.cuModuleLoadData(&mut module, ptx_src.as_ptr() as *const c_void)
                != CUresult::CUDA_SUCCESS
            {
                return Ok(CompileOutcome::InvalidBinary);
            }
            if lib.cuModuleGetFunction(&mut function, module, name.as_ptr())
                != CUresult::CUDA_SUCCESS
            {
                return Ok(CompileOutcome::InvalidBinary);
            }
        }

        let id = KernelId::from_raw(self.kernels.len());
        self.kernels.push(CudaKernel {
            function,
            args: BTreeMap::new(),
        });
        Ok(CompileOutcome::Success(id))
    }

    fn kernel_local_memory(&mut self, kernel: KernelId) -> Result<usize> {
        let function = self.kernel(kernel)?.function;
        let mut bytes = 0i32;
        unsafe {
            check(
                sys::lib().cuFuncGetAttribute(
                    &mut bytes,
                    sys::CUfunction_attribute::CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES,
                    function,
                ),
                "cuFuncGetAttribute",
            )?;
        }
        Ok(bytes as usize)
    }

    fn create_buffer(&mut self, initial: &HostArray) -> Result<BufferId> {
        let id = BufferId::from_raw(self.buffers.len());
        let buffer = match initial {
            HostArray::I32(v) => DeviceBuffer::I32(self.device.htod_sync_copy(v)?),
            HostArray::U64(v) => DeviceBuffer::U64(self.device.htod_sync_copy(v)?),
            HostArray::F32(v) => DeviceBuffer::F32(self.device.htod_sync_copy(v)?),
            HostArray::F64(v) => DeviceBuffer::F64(self.device.htod_sync_copy(v)?),
            HostArray::CF32(v) => {
                let flat: Vec<f32> = v.iter().flat_map(|c| [c.re, c.im]).collect();
                DeviceBuffer::CF32(self.device.htod_sync_copy(&flat)?)
            }
            HostArray::CF64(v) => {
                let flat: Vec<f64> = v.iter().flat_map(|c| [c.re, c.im]).collect();
                DeviceBuffer::CF64(self.device.htod_sync_copy(&flat)?)
            }
        };
        self.buffers.push(buffer);
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &HostArray) -> Result<()> {
        let device = Arc::clone(&self.device);
        let slot = self
            .buffers
            .get_mut(buffer.raw())
            .ok_or_else(|| anyhow!("unknown buffer {buffer:?}"))?;
        match (slot, data) {
            (DeviceBuffer::I32(s), HostArray::I32(v)) => device.htod_sync_copy_into(v, s)?,
            (DeviceBuffer::U64(s), HostArray::U64(v)) => device.htod_sync_copy_into(v, s)?,
            (DeviceBuffer::F32(s), HostArray::F32(v)) => device.htod_sync_copy_into(v, s)?,
            (DeviceBuffer::F64(s), HostArray::F64(v)) => device.htod_sync_copy_into(v, s)?,
            (DeviceBuffer::CF32(s), HostArray::CF32(v)) => {
                let flat: Vec<f32> = v.iter().flat_map(|c| [c.re, c.im]).collect();
                device.htod_sync_copy_into(&flat, s)?;
            }
            (DeviceBuffer::CF64(s), HostArray::CF64(v)) => {
                let flat: Vec<f64> = v.iter().flat_map(|c| [c.re, c.im]).collect();
                device.htod_sync_copy_into(&flat, s)?;
            }
            _ => bail!("buffer write type mismatch"),
        }
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId, ty: ElementType, len: usize) -> Result<HostArray> {
        let slot = self
            .buffers
            .get(buffer.raw())
            .ok_or_else(|| anyhow!("unknown buffer {buffer:?}"))?;
        let out = match (slot, ty) {
            (DeviceBuffer::I32(s), ElementType::I32) => {
                HostArray::I32(self.device.dtoh_sync_copy(s)?)
            }
            (DeviceBuffer::U64(s), ElementType::U64) => {
                HostArray::U64(self.device.dtoh_sync_copy(s)?)
            }
            (DeviceBuffer::F32(s), ElementType::F32) => {
                HostArray::F32(self.device.dtoh_sync_copy(s)?)
            }
            (DeviceBuffer::F64(s), ElementType::F64) => {
                HostArray::F64(self.device.dtoh_sync_copy(s)?)
            }
            (DeviceBuffer::CF32(s), ElementType::CF32) => {
                let flat = self.device.dtoh_sync_copy(s)?;
                HostArray::CF32(
                    flat.chunks_exact(2)
                        .map(|c| crate::Complex32::new(c[0], c[1]))
                        .collect(),
                )
            }
            (DeviceBuffer::CF64(s), ElementType::CF64) => {
                let flat = self.device.dtoh_sync_copy(s)?;
                HostArray::CF64(
                    flat.chunks_exact(2)
                        .map(|c| crate::Complex64::new(c[0], c[1]))
                        .collect(),
                )
            }
            _ => bail!("buffer read type mismatch"),
        };
        ensure!(out.len() == len, "buffer read length mismatch");
        Ok(out)
    }

    fn set_scalar_argument(
        &mut self,
        kernel: KernelId,
        index: usize,
        value: ScalarValue,
    ) -> Result<()> {
        let kernel = self
            .kernels
            .get_mut(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel"))?;
        kernel.args.insert(index, CudaArg::Scalar(value));
        Ok(())
    }

    fn set_buffer_argument(
        &mut self,
        kernel: KernelId,
        index: usize,
        buffer: BufferId,
    ) -> Result<()> {
        ensure!(buffer.raw() < self.buffers.len(), "unknown buffer {buffer:?}");
        let kernel = self
            .kernels
            .get_mut(kernel.raw())
            .ok_or_else(|| anyhow!("unknown kernel"))?;
        kernel.args.insert(index, CudaArg::Buffer(buffer));
        Ok(())
    }

    fn enqueue_kernel(
        &mut self,
        kernel: KernelId,
        global: &[usize],
        local: &[usize],
    ) -> Result<EventId> {
        ensure!(
            !global.is_empty() && global.len() <= 3 && global.len() == local.len(),
            "launch geometry must have 1-3 matching dimensions"
        );
        let entry = self.kernel(kernel)?;

        // Per-argument staging: 16 bytes covers every scalar type, and buffer
        // arguments are passed as the 8-byte device pointer value.
        let mut storage: Vec<[u8; 16]> = vec![[0u8; 16]; entry.args.len()];
        let mut params: Vec<*mut c_void> = Vec::with_capacity(entry.args.len());
        for (slot, (index, arg)) in storage.iter_mut().zip(entry.args.iter()) {
            ensure!(
                *index == params.len(),
                "argument positions must be contiguous from 0 (missing index {})",
                params.len()
            );
            match arg {
                CudaArg::Scalar(ScalarValue::I32(v)) => {
                    slot[..4].copy_from_slice(&v.to_ne_bytes())
                }
                CudaArg::Scalar(ScalarValue::U64(v)) => {
                    slot[..8].copy_from_slice(&v.to_ne_bytes())
                }
                CudaArg::Scalar(ScalarValue::F32(v)) => {
                    slot[..4].copy_from_slice(&v.to_ne_bytes())
                }
                CudaArg::Scalar(ScalarValue::F64(v)) => {
                    slot[..8].copy_from_slice(&v.to_ne_bytes())
                }
                CudaArg::Scalar(ScalarValue::CF32(v)) => {
                    slot[..4].copy_from_slice(&v.re.to_ne_bytes());
                    slot[4..8].copy_from_slice(&v.im.to_ne_bytes());
                }
                CudaArg::Scalar(ScalarValue::CF64(v)) => {
                    slot[..8].copy_from_slice(&v.re.to_ne_bytes());
                    slot[8..].copy_from_slice(&v.im.to_ne_bytes());
                }
                CudaArg::Buffer(id) => {
                    let ptr = self.buffers[id.raw()].device_ptr();
                    slot[..8].copy_from_slice(&ptr.to_ne_bytes());
                }
            }
            params.push(slot.as_mut_ptr() as *mut c_void);
        }

        let mut grid = [1u32; 3];
        let mut block = [1u32; 3];
        for (axis, (&g, &l)) in global.iter().zip(local.iter()).enumerate() {
            ensure!(l > 0 && g % l == 0, "global size not divisible by local size");
            grid[axis] = (g / l) as u32;
            block[axis] = l as u32;
        }

        let mut pair = CudaEventPair {
            start: std::ptr::null_mut(),
            end: std::ptr::null_mut(),
        };
        unsafe {
            let lib = sys::lib();
            check(lib.cuEventCreate(&mut pair.start, 0), "cuEventCreate")?;
            check(lib.cuEventCreate(&mut pair.end, 0), "cuEventCreate")?;
            check(lib.cuEventRecord(pair.start, std::ptr::null_mut()), "cuEventRecord")?;
            check(
                lib.cuLaunchKernel(
                    entry.function,
                    grid[0],
                    grid[1],
                    grid[2],
                    block[0],
                    block[1],
                    block[2],
                    0,
                    std::ptr::null_mut(),
                    params.as_mut_ptr(),
                    std::ptr::null_mut(),
                ),
                "cuLaunchKernel",
            )?;
            check(lib.cuEventRecord(pair.end, std::ptr::null_mut()), "cuEventRecord")?;
        }

        let id = EventId::from_raw(self.events.len());
        self.events.push(pair);
        Ok(id)
    }

    fn wait(&mut self, event: EventId) -> Result<()> {
        let pair = self
            .events
            .get(event.raw())
            .ok_or_else(|| anyhow!("unknown event {event:?}"))?;
        unsafe { check(sys::lib().cuEventSynchronize(pair.end), "cuEventSynchronize") }
    }

    fn elapsed_ms(&mut self, event: EventId) -> Result<f64> {
        let pair = self
            .events
            .get(event.raw())
            .ok_or_else(|| anyhow!("unknown event {event:?}"))?;
        let mut ms = 0f32;
        unsafe {
            check(
                sys::lib().cuEventElapsedTime(&mut ms, pair.start, pair.end),
                "cuEventElapsedTime",
            )?;
        }
        Ok(ms as f64)
    }
}
