//! Typed host-side data and device handles.

use serde::{Deserialize, Serialize};

/// Complex single-precision value, laid out as the device expects (`re`, `im`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Complex double-precision value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex32 {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

impl Complex64 {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Element types supported for kernel arguments and buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    I32,
    U64,
    F32,
    F64,
    CF32,
    CF64,
}

impl ElementType {
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::F64 | ElementType::CF32 => 8,
            ElementType::CF64 => 16,
        }
    }
}

/// A host-side array with its element type carried in the variant.
///
/// Reference snapshots and buffer uploads/downloads all travel through this
/// type, so element types can never be confused with each other.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    I32(Vec<i32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    CF32(Vec<Complex32>),
    CF64(Vec<Complex64>),
}

impl HostArray {
    pub fn element_type(&self) -> ElementType {
        match self {
            HostArray::I32(_) => ElementType::I32,
            HostArray::U64(_) => ElementType::U64,
            HostArray::F32(_) => ElementType::F32,
            HostArray::F64(_) => ElementType::F64,
            HostArray::CF32(_) => ElementType::CF32,
            HostArray::CF64(_) => ElementType::CF64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostArray::I32(v) => v.len(),
            HostArray::U64(v) => v.len(),
            HostArray::F32(v) => v.len(),
            HostArray::F64(v) => v.len(),
            HostArray::CF32(v) => v.len(),
            HostArray::CF64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.len() * self.element_type().size_bytes()
    }

    /// A zero-filled array of the given type and length. The measurement
    /// pipeline keeps one of these per output buffer and reuses it for every
    /// reset.
    pub fn zeros(ty: ElementType, len: usize) -> Self {
        match ty {
            ElementType::I32 => HostArray::I32(vec![0; len]),
            ElementType::U64 => HostArray::U64(vec![0; len]),
            ElementType::F32 => HostArray::F32(vec![0.0; len]),
            ElementType::F64 => HostArray::F64(vec![0.0; len]),
            ElementType::CF32 => HostArray::CF32(vec![Complex32::default(); len]),
            ElementType::CF64 => HostArray::CF64(vec![Complex64::default(); len]),
        }
    }
}

/// A scalar kernel argument, embedded at launch time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    I32(i32),
    U64(u64),
    F32(f32),
    F64(f64),
    CF32(Complex32),
    CF64(Complex64),
}

impl ScalarValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            ScalarValue::I32(_) => ElementType::I32,
            ScalarValue::U64(_) => ElementType::U64,
            ScalarValue::F32(_) => ElementType::F32,
            ScalarValue::F64(_) => ElementType::F64,
            ScalarValue::CF32(_) => ElementType::CF32,
            ScalarValue::CF64(_) => ElementType::CF64,
        }
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::I32(v)
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        ScalarValue::U64(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::F32(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::F64(v)
    }
}

impl From<Complex32> for ScalarValue {
    fn from(v: Complex32) -> Self {
        ScalarValue::CF32(v)
    }
}

impl From<Complex64> for ScalarValue {
    fn from(v: Complex64) -> Self {
        ScalarValue::CF64(v)
    }
}

/// Opaque handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Opaque handle to a compiled kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(usize);

/// Opaque handle to a launch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(usize);

impl BufferId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl KernelId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl EventId {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Static properties of a device, queried once at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
    pub max_work_group_size: usize,
    pub max_work_item_dimensions: usize,
    pub max_work_item_sizes: [usize; 3],
    pub local_memory_bytes: usize,
}

impl DeviceInfo {
    /// Generous limits for host-side testing.
    pub fn unbounded(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "mock 1.0".to_string(),
            max_work_group_size: usize::MAX,
            max_work_item_dimensions: 3,
            max_work_item_sizes: [usize::MAX; 3],
            local_memory_bytes: usize::MAX,
        }
    }
}

/// Outcome of submitting source to the device toolchain.
#[derive(Debug)]
pub enum CompileOutcome {
    Success(KernelId),
    /// The toolchain rejected the source; the log is surfaced to diagnostics.
    CompileError(String),
    /// The toolchain produced nothing usable.
    InvalidBinary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::I32.size_bytes(), 4);
        assert_eq!(ElementType::U64.size_bytes(), 8);
        assert_eq!(ElementType::CF32.size_bytes(), 8);
        assert_eq!(ElementType::CF64.size_bytes(), 16);
    }

    #[test]
    fn test_zeros_matches_type_and_len() {
        let z = HostArray::zeros(ElementType::CF32, 7);
        assert_eq!(z.element_type(), ElementType::CF32);
        assert_eq!(z.len(), 7);
        assert_eq!(z.size_bytes(), 56);
    }

    #[test]
    fn test_scalar_conversions() {
        let s: ScalarValue = 3i32.into();
        assert_eq!(s.element_type(), ElementType::I32);
        let s: ScalarValue = Complex64::new(1.0, -1.0).into();
        assert_eq!(s.element_type(), ElementType::CF64);
    }
}
