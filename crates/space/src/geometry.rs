//! Launch-geometry transforms and their validation against device limits.

use thiserror::Error;
use tuneforge_device::DeviceInfo;

/// How a parameter value rescales one axis of the launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    MulGlobal,
    DivGlobal,
    MulLocal,
    DivLocal,
}

/// One geometry operation, applied left-to-right to the base geometry.
#[derive(Debug, Clone)]
pub struct GeometryTransform {
    pub kind: TransformKind,
    pub axis: usize,
    pub parameter: String,
}

/// Per-configuration geometry failures. These prune configurations at
/// enumeration time; the measurement pipeline also re-checks them and turns
/// any violation into a soft `Failed` result rather than aborting the search.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("axis {axis}: size {size} is not divisible by `{parameter}` = {value}")]
    NotDivisible {
        axis: usize,
        parameter: String,
        size: usize,
        value: usize,
    },

    #[error("kernel has {dims} dimensions but the device supports {limit}")]
    TooManyDimensions { dims: usize, limit: usize },

    #[error("axis {axis}: local size {size} exceeds the device limit {limit}")]
    LocalAxisTooLarge {
        axis: usize,
        size: usize,
        limit: usize,
    },

    #[error("work-group size {size} exceeds the device limit {limit}")]
    WorkGroupTooLarge { size: usize, limit: usize },

    #[error("axis {axis}: global size {global} is not divisible by local size {local}")]
    GlobalNotDivisibleByLocal {
        axis: usize,
        global: usize,
        local: usize,
    },
}

/// Apply one transform in place.
pub(crate) fn apply_transform(
    transform: &GeometryTransform,
    value: usize,
    global: &mut [usize],
    local: &mut [usize],
) -> Result<(), GeometryError> {
    let target = match transform.kind {
        TransformKind::MulGlobal | TransformKind::DivGlobal => &mut global[transform.axis],
        TransformKind::MulLocal | TransformKind::DivLocal => &mut local[transform.axis],
    };
    match transform.kind {
        TransformKind::MulGlobal | TransformKind::MulLocal => {
            *target *= value;
        }
        TransformKind::DivGlobal | TransformKind::DivLocal => {
            if value == 0 || *target % value != 0 {
                return Err(GeometryError::NotDivisible {
                    axis: transform.axis,
                    parameter: transform.parameter.clone(),
                    size: *target,
                    value,
                });
            }
            *target /= value;
        }
    }
    Ok(())
}

/// Check a transformed geometry against the device limits: per-axis local
/// bounds, total work-group size, and global-divisible-by-local.
pub fn validate_ranges(
    global: &[usize],
    local: &[usize],
    info: &DeviceInfo,
) -> Result<(), GeometryError> {
    if global.len() > info.max_work_item_dimensions {
        return Err(GeometryError::TooManyDimensions {
            dims: global.len(),
            limit: info.max_work_item_dimensions,
        });
    }
    let mut group_size = 1usize;
    for (axis, &size) in local.iter().enumerate() {
        let limit = info.max_work_item_sizes[axis];
        if size > limit {
            return Err(GeometryError::LocalAxisTooLarge { axis, size, limit });
        }
        group_size = group_size.saturating_mul(size);
    }
    if group_size > info.max_work_group_size {
        return Err(GeometryError::WorkGroupTooLarge {
            size: group_size,
            limit: info.max_work_group_size,
        });
    }
    for (axis, (&g, &l)) in global.iter().zip(local.iter()).enumerate() {
        if l == 0 || g % l != 0 {
            return Err(GeometryError::GlobalNotDivisibleByLocal {
                axis,
                global: g,
                local: l,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(kind: TransformKind, axis: usize) -> GeometryTransform {
        GeometryTransform {
            kind,
            axis,
            parameter: "P".into(),
        }
    }

    #[test]
    fn test_mul_then_div() {
        let mut global = vec![1024, 512];
        let mut local = vec![8, 8];
        apply_transform(&transform(TransformKind::MulGlobal, 0), 2, &mut global, &mut local)
            .unwrap();
        apply_transform(&transform(TransformKind::DivGlobal, 1), 4, &mut global, &mut local)
            .unwrap();
        apply_transform(&transform(TransformKind::MulLocal, 1), 2, &mut global, &mut local)
            .unwrap();
        assert_eq!(global, vec![2048, 128]);
        assert_eq!(local, vec![8, 16]);
    }

    #[test]
    fn test_inexact_division_is_an_error() {
        let mut global = vec![10];
        let mut local = vec![1];
        let err = apply_transform(&transform(TransformKind::DivGlobal, 0), 3, &mut global, &mut local)
            .unwrap_err();
        assert!(matches!(err, GeometryError::NotDivisible { .. }));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let mut global = vec![10];
        let mut local = vec![1];
        let err = apply_transform(&transform(TransformKind::DivGlobal, 0), 0, &mut global, &mut local)
            .unwrap_err();
        assert!(matches!(err, GeometryError::NotDivisible { value: 0, .. }));
    }

    #[test]
    fn test_validate_against_device_limits() {
        let mut info = DeviceInfo::unbounded("test");
        info.max_work_item_sizes = [16, 16, 16];
        info.max_work_group_size = 128;

        assert!(validate_ranges(&[64, 64], &[16, 8], &info).is_ok());
        assert!(matches!(
            validate_ranges(&[64], &[32], &info),
            Err(GeometryError::LocalAxisTooLarge { .. })
        ));
        assert!(matches!(
            validate_ranges(&[256, 256], &[16, 16], &info),
            Err(GeometryError::WorkGroupTooLarge { .. })
        ));
        assert!(matches!(
            validate_ranges(&[100], &[16], &info),
            Err(GeometryError::GlobalNotDivisibleByLocal { .. })
        ));
    }
}
