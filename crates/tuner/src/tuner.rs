//! The tuning coordinator and its definition-phase API.
//!
//! A session has two phases. During the definition phase the caller adds
//! kernels, parameters, constraints, geometry transforms and arguments.
//! `tune()` freezes the schema, runs the reference once (if configured),
//! drives the selected search strategy through the measurement pipeline for
//! each kernel, and finally runs the optional surrogate phase. The
//! coordinator is single-threaded and sequential on purpose: measurements
//! are totally ordered and the device is never contended.

use crate::error::TuneError;
use crate::pipeline::{self, MeasuredRun};
use crate::registry::{ArgumentRegistry, BufferBinding};
use crate::reports;
use crate::result::{summarize, RunStatus, TuningResult, TuningSummary};
use crate::search_driver::build_searcher;
use crate::session::{SearchMethod, SessionConfig, SurrogateConfig};
use crate::verify::ReferenceSnapshot;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tuneforge_device::{Device, DeviceInfo, HostArray, ScalarValue};
use tuneforge_model::{LinearRegression, SurrogateModel};
use tuneforge_space::{
    Configuration, Constraint, KernelSpace, LocalMemoryModel, TransformKind,
};

/// The auto-tuning session over one device.
pub struct Tuner<D: Device> {
    device: D,
    info: DeviceInfo,
    kernels: Vec<KernelSpace>,
    reference: Option<KernelSpace>,
    registry: ArgumentRegistry,
    results: Vec<TuningResult>,
    snapshot: Option<ReferenceSnapshot>,
    search_method: SearchMethod,
    num_runs: usize,
    l2_threshold: f64,
    seed: Option<u64>,
    surrogate: Option<SurrogateConfig>,
    frozen: bool,
    search_logs: Vec<(String, String)>,
}

impl<D: Device> Tuner<D> {
    pub fn new(device: D) -> Self {
        let info = device.info().clone();
        tracing::info!(device = %info.name, version = %info.version, "tuning session opened");
        Self {
            device,
            info,
            kernels: Vec::new(),
            reference: None,
            registry: ArgumentRegistry::new(),
            results: Vec::new(),
            snapshot: None,
            search_method: SearchMethod::Full,
            num_runs: 1,
            l2_threshold: 1e-4,
            seed: None,
            surrogate: None,
            frozen: false,
            search_logs: Vec::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn ensure_unfrozen(&self) -> Result<(), TuneError> {
        if self.frozen {
            Err(TuneError::SchemaFrozen)
        } else {
            Ok(())
        }
    }

    fn kernel_mut(&mut self, id: usize) -> Result<&mut KernelSpace, TuneError> {
        self.kernels.get_mut(id).ok_or(TuneError::UnknownKernel(id))
    }

    // ------------------------------------------------------------------
    // Definition phase: kernels and their schemas
    // ------------------------------------------------------------------

    /// Add a tunable kernel; returns its id for the schema calls below.
    pub fn add_kernel(
        &mut self,
        name: &str,
        source: &str,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<usize, TuneError> {
        self.ensure_unfrozen()?;
        self.kernels
            .push(KernelSpace::new(name, source, global, local)?);
        Ok(self.kernels.len() - 1)
    }

    pub fn add_kernel_from_file(
        &mut self,
        path: impl AsRef<Path>,
        name: &str,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<usize, TuneError> {
        let source = load_source(path.as_ref())?;
        self.add_kernel(name, &source, global, local)
    }

    /// Configure the trusted reference computation, run once before tuning;
    /// candidate outputs are verified against its snapshot. Calling this
    /// again replaces the previous reference.
    pub fn set_reference(
        &mut self,
        name: &str,
        source: &str,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.reference = Some(KernelSpace::new(name, source, global, local)?);
        Ok(())
    }

    pub fn set_reference_from_file(
        &mut self,
        path: impl AsRef<Path>,
        name: &str,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<(), TuneError> {
        let source = load_source(path.as_ref())?;
        self.set_reference(name, &source, global, local)
    }

    pub fn add_parameter(
        &mut self,
        kernel: usize,
        name: &str,
        values: &[usize],
    ) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.kernel_mut(kernel)?
            .add_parameter(name, values.to_vec())?;
        Ok(())
    }

    pub fn add_constraint(
        &mut self,
        kernel: usize,
        constraint: Constraint,
    ) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.kernel_mut(kernel)?.add_constraint(constraint)?;
        Ok(())
    }

    pub fn mul_global_size(
        &mut self,
        kernel: usize,
        parameter: &str,
        axis: usize,
    ) -> Result<(), TuneError> {
        self.add_transform(kernel, TransformKind::MulGlobal, parameter, axis)
    }

    pub fn div_global_size(
        &mut self,
        kernel: usize,
        parameter: &str,
        axis: usize,
    ) -> Result<(), TuneError> {
        self.add_transform(kernel, TransformKind::DivGlobal, parameter, axis)
    }

    pub fn mul_local_size(
        &mut self,
        kernel: usize,
        parameter: &str,
        axis: usize,
    ) -> Result<(), TuneError> {
        self.add_transform(kernel, TransformKind::MulLocal, parameter, axis)
    }

    pub fn div_local_size(
        &mut self,
        kernel: usize,
        parameter: &str,
        axis: usize,
    ) -> Result<(), TuneError> {
        self.add_transform(kernel, TransformKind::DivLocal, parameter, axis)
    }

    fn add_transform(
        &mut self,
        kernel: usize,
        kind: TransformKind,
        parameter: &str,
        axis: usize,
    ) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.kernel_mut(kernel)?
            .add_transform(kind, parameter, axis)?;
        Ok(())
    }

    pub fn set_local_memory_usage(
        &mut self,
        kernel: usize,
        model: LocalMemoryModel,
    ) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.kernel_mut(kernel)?.set_local_memory(model)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Definition phase: arguments
    // ------------------------------------------------------------------

    /// Scalar embedded at launch time; positions are assigned in insertion
    /// order across all argument kinds.
    pub fn add_argument_scalar(
        &mut self,
        value: impl Into<ScalarValue>,
    ) -> Result<usize, TuneError> {
        self.ensure_unfrozen()?;
        Ok(self.registry.add_scalar(value.into()))
    }

    /// Input buffer, uploaded once now and bound read-only for every launch.
    pub fn add_argument_input(&mut self, data: &HostArray) -> Result<usize, TuneError> {
        self.ensure_unfrozen()?;
        let buffer = self.device.create_buffer(data)?;
        Ok(self.registry.add_input(BufferBinding {
            buffer,
            ty: data.element_type(),
            len: data.len(),
        }))
    }

    /// Output buffer, zero-reset before every launch and compared against the
    /// reference snapshot after it.
    pub fn add_argument_output(&mut self, data: &HostArray) -> Result<usize, TuneError> {
        self.ensure_unfrozen()?;
        let buffer = self.device.create_buffer(data)?;
        Ok(self.registry.add_output(BufferBinding {
            buffer,
            ty: data.element_type(),
            len: data.len(),
        }))
    }

    // ------------------------------------------------------------------
    // Session options
    // ------------------------------------------------------------------

    pub fn use_full_search(&mut self) {
        self.search_method = SearchMethod::Full;
    }

    pub fn use_random_search(&mut self, fraction: f64) -> Result<(), TuneError> {
        self.set_search_method(SearchMethod::Random { fraction })
    }

    pub fn use_annealing(&mut self, fraction: f64, temperature: f64) -> Result<(), TuneError> {
        self.set_search_method(SearchMethod::Annealing {
            fraction,
            temperature,
        })
    }

    pub fn use_pso(
        &mut self,
        fraction: f64,
        swarm_size: usize,
        inertia: f64,
        cognitive: f64,
        social: f64,
    ) -> Result<(), TuneError> {
        self.set_search_method(SearchMethod::Pso {
            fraction,
            swarm_size,
            inertia,
            cognitive,
            social,
        })
    }

    fn set_search_method(&mut self, method: SearchMethod) -> Result<(), TuneError> {
        method.validate()?;
        self.search_method = method;
        Ok(())
    }

    /// Repeats per candidate; the recorded time is the minimum across them.
    pub fn set_num_runs(&mut self, num_runs: usize) {
        self.num_runs = num_runs.max(1);
    }

    pub fn set_l2_threshold(&mut self, threshold: f64) {
        self.l2_threshold = threshold;
    }

    /// Seed the randomized strategies; unseeded runs derive one from the
    /// clock.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    pub fn apply_session(&mut self, config: &SessionConfig) -> Result<(), TuneError> {
        config.validate()?;
        self.search_method = config.search_method.clone();
        self.num_runs = config.num_runs.max(1);
        self.l2_threshold = config.l2_threshold;
        self.seed = config.seed;
        self.surrogate = config.surrogate;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tuning phase
    // ------------------------------------------------------------------

    /// Run the session: reference first, then every kernel through its
    /// search, then the optional surrogate phase. Freezes the schema.
    pub fn tune(&mut self) -> Result<(), TuneError> {
        self.ensure_unfrozen()?;
        self.frozen = true;
        self.search_method.validate()?;

        if self.reference.is_some() {
            self.run_reference()?;
        }

        for k in 0..self.kernels.len() {
            let name = self.kernels[k].name().to_string();
            tracing::info!(kernel = %name, "tuning kernel");

            if !self.kernels[k].has_parameters() {
                let run = pipeline::measure_candidate(
                    &mut self.device,
                    &self.kernels[k],
                    &Configuration::empty(),
                    &self.registry,
                    self.num_runs,
                    self.snapshot.as_ref(),
                    self.l2_threshold,
                );
                log_outcome(&name, 1, 1, &run);
                self.results.push(TuningResult {
                    kernel: name,
                    configuration: Configuration::empty(),
                    time_ms: run.time_ms,
                    threads: run.threads,
                    status: run.status,
                });
                continue;
            }

            let set = Arc::new(self.kernels[k].enumerate(&self.info)?);
            let mut searcher = build_searcher(&self.search_method, Arc::clone(&set), self.seed);
            let total = searcher.num_configurations();
            for iteration in 0..total {
                let config = searcher.current().clone();
                let run = pipeline::measure_candidate(
                    &mut self.device,
                    &self.kernels[k],
                    &config,
                    &self.registry,
                    self.num_runs,
                    self.snapshot.as_ref(),
                    self.l2_threshold,
                );
                log_outcome(&name, iteration + 1, total, &run);
                searcher.push_execution_time(run.time_ms);
                searcher.advance();
                self.results.push(TuningResult {
                    kernel: name.clone(),
                    configuration: config,
                    time_ms: run.time_ms,
                    threads: run.threads,
                    status: run.status,
                });
            }

            let mut log = Vec::new();
            searcher.write_log(&mut log)?;
            self.search_logs
                .push((name, String::from_utf8_lossy(&log).into_owned()));
        }

        if let Some(surrogate) = self.surrogate {
            self.model_prediction(surrogate.validation_fraction, surrogate.top_k)?;
        }
        Ok(())
    }

    /// The reference is trusted, so a failure here is hard: without a
    /// snapshot every later verification would silently pass.
    fn run_reference(&mut self) -> Result<(), TuneError> {
        let Some(reference) = self.reference.clone() else {
            return Ok(());
        };
        tracing::info!(kernel = reference.name(), "running reference");
        pipeline::try_measure(
            &mut self.device,
            &reference,
            &Configuration::empty(),
            &self.registry,
            1,
            None,
            self.l2_threshold,
        )
        .map_err(|e| TuneError::Reference(format!("{e:#}")))?;
        let snapshot = ReferenceSnapshot::capture(&mut self.device, &self.registry)
            .map_err(|e| TuneError::Reference(format!("{e:#}")))?;
        self.snapshot = Some(snapshot);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Surrogate phase
    // ------------------------------------------------------------------

    /// Train the default linear-regression surrogate on the measured results,
    /// rank every valid configuration by predicted time, and re-measure the
    /// top `top_k` on the device.
    pub fn model_prediction(
        &mut self,
        validation_fraction: f32,
        top_k: usize,
    ) -> Result<(), TuneError> {
        self.model_prediction_with(LinearRegression::default(), validation_fraction, top_k)
    }

    /// Same as [`Tuner::model_prediction`] with explicit model parameters.
    pub fn model_prediction_with(
        &mut self,
        model: LinearRegression,
        validation_fraction: f32,
        top_k: usize,
    ) -> Result<(), TuneError> {
        for k in 0..self.kernels.len() {
            if !self.kernels[k].has_parameters() {
                continue;
            }
            let name = self.kernels[k].name().to_string();

            // Measured samples in search order; failed candidates carry no
            // usable time and are excluded from training.
            let measured: Vec<(Vec<f32>, f32)> = self
                .results
                .iter()
                .filter(|r| r.kernel == name && r.time_ms.is_finite())
                .map(|r| {
                    (
                        r.configuration.values().map(|v| v as f32).collect(),
                        r.time_ms as f32,
                    )
                })
                .collect();
            if measured.len() < 2 {
                return Err(TuneError::InsufficientTrainingData {
                    got: measured.len(),
                    needed: 2,
                });
            }

            // Chronological split: the leading results train, the trailing
            // fraction validates. No shuffling, so the split reflects
            // search-order statistics.
            let fraction = validation_fraction.clamp(0.0, 0.9);
            let validation = ((measured.len() as f32) * fraction) as usize;
            let training = measured.len() - validation;
            let features = measured[0].0.len();

            let matrix = |rows: &[(Vec<f32>, f32)]| -> (Array2<f32>, Array1<f32>) {
                let mut x = Array2::zeros((rows.len(), features));
                let mut y = Array1::zeros(rows.len());
                for (i, (row, time)) in rows.iter().enumerate() {
                    for (j, v) in row.iter().enumerate() {
                        x[[i, j]] = *v;
                    }
                    y[i] = *time;
                }
                (x, y)
            };
            let (x_train, y_train) = matrix(&measured[..training]);
            let mut model = model.clone();
            model.train(&x_train, &y_train).map_err(TuneError::Device)?;
            if validation > 0 {
                let (x_val, y_val) = matrix(&measured[training..]);
                let mse = model.validate(&x_val, &y_val).map_err(TuneError::Device)?;
                tracing::info!(kernel = %name, mse, "surrogate validation cost");
            }

            // Rank the whole enumeration by predicted time, ascending.
            let set = self.kernels[k].enumerate(&self.info)?;
            let mut ranked: Vec<(usize, f32)> = Vec::with_capacity(set.len());
            for index in 0..set.len() {
                let row: Vec<f32> = set.configuration(index).values().map(|v| v as f32).collect();
                let predicted = model.predict(&row).map_err(TuneError::Device)?;
                ranked.push((index, predicted));
            }
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

            for &(index, predicted) in ranked.iter().take(top_k) {
                let config = set.configuration(index).clone();
                tracing::info!(
                    kernel = %name,
                    %config,
                    predicted_ms = predicted,
                    "re-measuring top prediction"
                );
                let run = pipeline::measure_candidate(
                    &mut self.device,
                    &self.kernels[k],
                    &config,
                    &self.registry,
                    self.num_runs,
                    self.snapshot.as_ref(),
                    self.l2_threshold,
                );
                self.results.push(TuningResult {
                    kernel: name.clone(),
                    configuration: config,
                    time_ms: run.time_ms,
                    threads: run.threads,
                    status: run.status,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Results and reports
    // ------------------------------------------------------------------

    pub fn results(&self) -> &[TuningResult] {
        &self.results
    }

    pub fn summary(&self) -> TuningSummary {
        summarize(&self.results)
    }

    /// CSV report over all results, failed rows included.
    pub fn write_csv(&self, sink: &mut dyn Write) -> std::io::Result<()> {
        reports::write_csv(&self.results, sink)
    }

    /// JSON report for one kernel with caller-supplied metadata.
    pub fn write_json(
        &self,
        kernel: usize,
        meta: &BTreeMap<String, String>,
        sink: &mut dyn Write,
    ) -> Result<(), TuneError> {
        let space = self
            .kernels
            .get(kernel)
            .ok_or(TuneError::UnknownKernel(kernel))?;
        let report = reports::json_report(&self.info, space.name(), &self.results, meta);
        serde_json::to_writer_pretty(&mut *sink, &report)?;
        writeln!(sink)?;
        Ok(())
    }

    /// Per-iteration search logs for every tuned kernel.
    pub fn write_search_log(&self, sink: &mut dyn Write) -> std::io::Result<()> {
        for (kernel, text) in &self.search_logs {
            writeln!(sink, "kernel;{kernel}")?;
            sink.write_all(text.as_bytes())?;
        }
        Ok(())
    }
}

fn log_outcome(kernel: &str, step: usize, total: usize, run: &MeasuredRun) {
    match run.status {
        RunStatus::Ok => {
            tracing::info!(kernel, step, total, time_ms = run.time_ms, "completed")
        }
        RunStatus::Mismatch => {
            tracing::warn!(kernel, step, total, time_ms = run.time_ms, "output mismatch")
        }
        RunStatus::Failed => tracing::warn!(kernel, step, total, "candidate failed"),
    }
}

fn load_source(path: &Path) -> Result<String, TuneError> {
    std::fs::read_to_string(path).map_err(|source| TuneError::SourceFile {
        path: path.to_path_buf(),
        source,
    })
}
