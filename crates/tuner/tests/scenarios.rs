//! End-to-end tuning scenarios over the mock device.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tuneforge_tuner::{
    HostArray, LaunchRecord, LinearRegression, MockDevice, RunStatus, TuneError, Tuner,
};

fn define(record: &LaunchRecord, name: &str) -> usize {
    *record.defines.get(name).unwrap_or(&0)
}

#[test]
fn trivial_full_search_finds_the_smallest_k() {
    let mut device = MockDevice::new();
    device.set_time_fn(|record| define(record, "K") as f64);

    let mut tuner = Tuner::new(device);
    let kernel = tuner
        .add_kernel("scale", "kernel void scale() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "K", &[1, 2, 4, 8]).unwrap();
    tuner.tune().unwrap();

    assert_eq!(tuner.results().len(), 4);
    let best = tuner.summary().best_ok.unwrap();
    assert_eq!(best.configuration.get("K"), Some(1));
    assert_eq!(best.time_ms, 1.0);
    assert_eq!(best.threads, 8);
}

#[test]
fn reference_mismatch_keeps_timing_but_marks_status() {
    let mut device = MockDevice::new();
    device.set_time_fn(|_| 2.5);
    device.set_launch_effect(|record, buffers| {
        let mut data = vec![1.0f32, 2.0, 3.0, 4.0];
        if record.entry_point == "candidate" {
            data[0] += 0.5;
        }
        for (index, buffer) in &record.buffer_args {
            if *index == 0 {
                buffers[buffer.raw()] = HostArray::F32(data.clone());
            }
        }
    });

    let mut tuner = Tuner::new(device);
    tuner
        .set_reference("golden", "kernel void golden() {}", vec![4], vec![1])
        .unwrap();
    tuner
        .add_kernel("candidate", "kernel void candidate() {}", vec![4], vec![1])
        .unwrap();
    tuner
        .add_argument_output(&HostArray::F32(vec![0.0; 4]))
        .unwrap();
    tuner.set_l2_threshold(1e-4);
    tuner.tune().unwrap();

    let result = &tuner.results()[0];
    assert_eq!(result.status, RunStatus::Mismatch);
    assert_eq!(result.time_ms, 2.5);

    // The best-OK summary ignores the mismatching row; it is still the
    // fastest overall.
    let summary = tuner.summary();
    assert!(summary.best_ok.is_none());
    assert_eq!(summary.fastest.unwrap().status, RunStatus::Mismatch);
}

#[test]
fn matching_output_verifies_ok() {
    let mut device = MockDevice::new();
    device.set_launch_effect(|record, buffers| {
        for (index, buffer) in &record.buffer_args {
            if *index == 0 {
                buffers[buffer.raw()] = HostArray::F32(vec![1.0, 2.0, 3.0, 4.0]);
            }
        }
    });

    let mut tuner = Tuner::new(device);
    tuner
        .set_reference("golden", "kernel void golden() {}", vec![4], vec![1])
        .unwrap();
    tuner
        .add_kernel("candidate", "kernel void candidate() {}", vec![4], vec![1])
        .unwrap();
    tuner
        .add_argument_output(&HostArray::F32(vec![0.0; 4]))
        .unwrap();
    tuner.tune().unwrap();

    assert_eq!(tuner.results()[0].status, RunStatus::Ok);
}

fn annealing_search_log(seed: u64) -> Vec<u8> {
    let mut device = MockDevice::new();
    device.set_time_fn(|record| {
        let mut hasher = DefaultHasher::new();
        for (name, value) in &record.defines {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        (hasher.finish() % 100) as f64
    });

    let mut tuner = Tuner::new(device);
    let kernel = tuner
        .add_kernel("anneal", "kernel void anneal() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "A", &[1, 2, 3, 4, 5]).unwrap();
    tuner
        .add_parameter(kernel, "B", &[1, 2, 3, 4, 5, 6, 7, 8])
        .unwrap();
    // 40 valid configurations, fraction 0.5: a budget of 20 evaluations.
    tuner.use_annealing(0.5, 4.0).unwrap();
    tuner.set_seed(seed);
    tuner.tune().unwrap();
    assert_eq!(tuner.results().len(), 20);

    let mut log = Vec::new();
    tuner.write_search_log(&mut log).unwrap();
    log
}

#[test]
fn annealing_runs_are_reproducible_for_a_fixed_seed() {
    let first = annealing_search_log(42);
    let second = annealing_search_log(42);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn surrogate_ranking_recovers_the_ground_truth_argmin() {
    let mut device = MockDevice::new();
    device.set_time_fn(|record| {
        let p1 = define(record, "P1") as f64;
        let p2 = define(record, "P2") as f64;
        let p3 = define(record, "P3") as f64;
        2.0 * p1 + 0.5 * p2 * p2 + p3
    });

    let mut tuner = Tuner::new(device);
    let kernel = tuner
        .add_kernel("poly", "kernel void poly() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "P1", &[1, 2, 4]).unwrap();
    tuner.add_parameter(kernel, "P2", &[1, 2, 3, 4]).unwrap();
    tuner.add_parameter(kernel, "P3", &[1, 2, 4]).unwrap();
    tuner.tune().unwrap();
    assert_eq!(tuner.results().len(), 36);

    tuner
        .model_prediction_with(LinearRegression::new(1500, 0.05, 0.1), 0.2, 1)
        .unwrap();
    assert_eq!(tuner.results().len(), 37);

    // The re-measured top prediction is the argmin of 2·P1 + 0.5·P2² + P3.
    let best = tuner.results().last().unwrap();
    assert_eq!(best.configuration.get("P1"), Some(1));
    assert_eq!(best.configuration.get("P2"), Some(1));
    assert_eq!(best.configuration.get("P3"), Some(1));
    assert_eq!(best.time_ms, 3.5);
}

#[test]
fn compile_failures_are_recorded_and_the_search_continues() {
    let mut device = MockDevice::new();
    device.fail_compiles_containing("#define MODE 1\n");
    device.set_time_fn(|record| define(record, "MODE") as f64);

    let mut tuner = Tuner::new(device);
    let kernel = tuner
        .add_kernel("switchy", "kernel void switchy() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "MODE", &[1, 2]).unwrap();
    tuner.tune().unwrap();

    let results = tuner.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, RunStatus::Failed);
    assert!(results[0].time_ms.is_infinite());
    assert_eq!(results[1].status, RunStatus::Ok);
    assert_eq!(tuner.summary().best_ok.unwrap().configuration.get("MODE"), Some(2));
}

#[test]
fn schema_mutations_after_tune_are_rejected() {
    let mut tuner = Tuner::new(MockDevice::new());
    let kernel = tuner
        .add_kernel("k", "kernel void k() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "V", &[1, 2]).unwrap();
    tuner.tune().unwrap();

    assert!(matches!(
        tuner.add_parameter(kernel, "W", &[1]),
        Err(TuneError::SchemaFrozen)
    ));
    assert!(matches!(
        tuner.add_argument_scalar(3i32),
        Err(TuneError::SchemaFrozen)
    ));
    assert!(matches!(tuner.tune(), Err(TuneError::SchemaFrozen)));
}

#[test]
fn unsatisfiable_spaces_surface_a_hard_error_with_no_results() {
    let mut tuner = Tuner::new(MockDevice::new());
    let kernel = tuner
        .add_kernel("k", "kernel void k() {}", vec![64], vec![8])
        .unwrap();
    tuner.add_parameter(kernel, "V", &[3, 5]).unwrap();
    // 64 is divisible by neither value, so every configuration is pruned.
    tuner.div_global_size(kernel, "V", 0).unwrap();

    assert!(matches!(tuner.tune(), Err(TuneError::Space(_))));
    assert!(tuner.results().is_empty());
}
