//! Search strategies over a kernel's valid configuration enumeration.
//!
//! All strategies speak the same protocol: the coordinator asks for the
//! `current` configuration, measures it, pushes the execution time back as
//! feedback, and calls `advance`, for exactly `num_configurations`
//! iterations. Feedback of `+∞` means the candidate failed and is treated as
//! worst-possible: it is never accepted and never becomes the best.
//!
//! Each randomized strategy owns a seeded [`fastrand::Rng`]; runs with the
//! same seed are reproducible, and the seed is recorded in the search log.

pub mod annealing;
pub mod full;
pub mod pso;
pub mod random;
pub mod trace;

pub use annealing::Annealing;
pub use full::FullSearch;
pub use pso::Pso;
pub use random::RandomSearch;
pub use trace::{SearchTrace, TraceRow};

use std::io;
use tuneforge_space::Configuration;

/// The uniform strategy contract driven by the tuning coordinator.
pub trait Searcher {
    /// Number of iterations this searcher will request; the coordinator
    /// drives it exactly this many times.
    fn num_configurations(&self) -> usize;

    /// The configuration to evaluate next.
    fn current(&self) -> &Configuration;

    /// Feedback for the configuration returned by the latest `current`.
    /// `+∞` signals a failed candidate.
    fn push_execution_time(&mut self, time_ms: f64);

    /// Transition to the next configuration (strategy-specific).
    fn advance(&mut self);

    /// Emit the per-step trace.
    fn write_log(&self, sink: &mut dyn io::Write) -> io::Result<()>;
}

/// Evaluation budget for fraction-driven strategies: `⌈fraction · n⌉`,
/// clamped into `1..=n`.
pub(crate) fn sample_budget(fraction: f64, n: usize) -> usize {
    ((fraction * n as f64).ceil() as usize).clamp(1, n)
}

/// Seed for strategies the caller did not seed explicitly.
pub(crate) fn seed_from_clock() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}
