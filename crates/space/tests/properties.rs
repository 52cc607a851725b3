//! Property-based tests for enumeration and geometry.
//!
//! Uses proptest to check the enumeration against an independent filter over
//! the raw cartesian product, and the transform algebra against a direct
//! symbolic reduction.

use proptest::prelude::*;
use tuneforge_device::DeviceInfo;
use tuneforge_space::{Constraint, ConstraintFn, KernelSpace, TransformKind};

/// Pool of binary predicates a random schema can draw from.
const PREDICATES: &[ConstraintFn] = &[
    |v| v[0] <= v[1],
    |v| v[0] != v[1],
    |v| v[0] % 2 == 0,
    |v| v[0] * v[1] <= 64,
];

fn predicate_arity(index: usize) -> usize {
    match index {
        2 => 1,
        _ => 2,
    }
}

#[derive(Debug, Clone)]
struct SchemaSpec {
    values: Vec<Vec<usize>>,
    constraints: Vec<(usize, Vec<usize>)>,
}

fn schema_strategy() -> impl Strategy<Value = SchemaSpec> {
    let params = prop::collection::vec(
        prop::collection::vec(1usize..=16, 1..=8).prop_map(|mut v| {
            v.sort_unstable();
            v.dedup();
            v
        }),
        1..=5,
    );
    params
        .prop_flat_map(|values| {
            let n = values.len();
            let constraints = prop::collection::vec(
                (0usize..PREDICATES.len()).prop_flat_map(move |p| {
                    prop::collection::vec(0usize..n, predicate_arity(p))
                        .prop_map(move |refs| (p, refs))
                }),
                0..=3,
            );
            (Just(values), constraints)
        })
        .prop_map(|(values, constraints)| SchemaSpec {
            values,
            constraints,
        })
}

fn build_kernel(spec: &SchemaSpec) -> KernelSpace {
    let mut kernel =
        KernelSpace::new("prop", "kernel void prop() {}", vec![1024], vec![1]).unwrap();
    for (i, values) in spec.values.iter().enumerate() {
        kernel.add_parameter(format!("P{i}"), values.clone()).unwrap();
    }
    for (p, refs) in &spec.constraints {
        let names: Vec<String> = refs.iter().map(|r| format!("P{r}")).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        kernel
            .add_constraint(Constraint::new(&name_refs, PREDICATES[*p]))
            .unwrap();
    }
    kernel
}

/// Independent filter over the raw cartesian product, in lexicographic
/// declaration order.
fn brute_force(spec: &SchemaSpec) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut odometer = vec![0usize; spec.values.len()];
    loop {
        let values: Vec<usize> = odometer
            .iter()
            .zip(spec.values.iter())
            .map(|(&i, vs)| vs[i])
            .collect();
        let ok = spec.constraints.iter().all(|(p, refs)| {
            let args: Vec<usize> = refs.iter().map(|&r| values[r]).collect();
            PREDICATES[*p](&args)
        });
        if ok {
            out.push(values);
        }
        let mut axis = spec.values.len();
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            odometer[axis] += 1;
            if odometer[axis] < spec.values[axis].len() {
                break;
            }
            odometer[axis] = 0;
        }
    }
}

proptest! {
    // Property: the enumerator returns exactly the constraint-satisfying
    // subset of the cartesian product, in lexicographic order.
    #[test]
    fn prop_enumeration_completeness(spec in schema_strategy()) {
        let kernel = build_kernel(&spec);
        let expected = brute_force(&spec);
        let actual = kernel.enumerate(&DeviceInfo::unbounded("prop"));

        match actual {
            Ok(set) => {
                let got: Vec<Vec<usize>> = set
                    .configurations()
                    .iter()
                    .map(|c| c.values().collect())
                    .collect();
                prop_assert_eq!(got, expected);
            }
            Err(_) => prop_assert!(expected.is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
struct TransformSpec {
    ops: Vec<(bool, bool, usize, usize)>, // (is_mul, on_global, axis, value)
}

fn transform_strategy() -> impl Strategy<Value = TransformSpec> {
    prop::collection::vec(
        (any::<bool>(), any::<bool>(), 0usize..2, 1usize..=4),
        0..6,
    )
    .prop_map(|ops| TransformSpec { ops })
}

proptest! {
    // Property: the applied transform sequence equals its direct symbolic
    // reduction, and an inexact division invalidates the configuration.
    #[test]
    fn prop_geometry_algebra(spec in transform_strategy()) {
        let base_global = [1152usize, 768];
        let base_local = [4usize, 6];

        let mut kernel = KernelSpace::new(
            "geom",
            "kernel void geom() {}",
            base_global.to_vec(),
            base_local.to_vec(),
        )
        .unwrap();
        for (i, (is_mul, on_global, axis, value)) in spec.ops.iter().enumerate() {
            let name = format!("T{i}");
            kernel.add_parameter(name.clone(), vec![*value]).unwrap();
            let kind = match (is_mul, on_global) {
                (true, true) => TransformKind::MulGlobal,
                (false, true) => TransformKind::DivGlobal,
                (true, false) => TransformKind::MulLocal,
                (false, false) => TransformKind::DivLocal,
            };
            kernel.add_transform(kind, &name, *axis).unwrap();
        }

        // Direct reduction.
        let mut global = base_global;
        let mut local = base_local;
        let mut divisible = true;
        for (is_mul, on_global, axis, value) in &spec.ops {
            let target = if *on_global { &mut global[*axis] } else { &mut local[*axis] };
            if *is_mul {
                *target *= value;
            } else if *target % value == 0 {
                *target /= value;
            } else {
                divisible = false;
                break;
            }
        }

        let config_count = kernel.enumerate(&DeviceInfo::unbounded("geom")).map(|s| s.len());
        if divisible {
            // The single configuration survives exactly when global stays
            // divisible by local on every axis.
            let launchable = global.iter().zip(local.iter()).all(|(g, l)| *l > 0 && g % l == 0);
            if launchable {
                prop_assert_eq!(config_count.unwrap(), 1);
                let set = kernel.enumerate(&DeviceInfo::unbounded("geom")).unwrap();
                let (g, l) = kernel.compute_ranges(set.configuration(0)).unwrap();
                prop_assert_eq!(g, global.to_vec());
                prop_assert_eq!(l, local.to_vec());
            } else {
                prop_assert!(config_count.is_err());
            }
        } else {
            prop_assert!(config_count.is_err());
        }
    }
}
