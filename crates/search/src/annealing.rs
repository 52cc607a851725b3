//! Simulated annealing with Metropolis acceptance.

use crate::trace::SearchTrace;
use crate::{sample_budget, seed_from_clock, Searcher};
use std::io;
use std::sync::Arc;
use tuneforge_space::{Configuration, ConfigurationSet};

/// How many neighbor redraws are attempted before the walk stays in place.
const MAX_NEIGHBOR_RETRIES: usize = 64;

/// Neighbor-walk over the valid enumeration with Metropolis acceptance
/// against the linear temperature schedule `T(s) = T₀ · (1 − s / budget)`.
///
/// Neighbors differ from the accepted state in exactly one parameter, drawn
/// uniformly; proposals outside the valid enumeration are redrawn a bounded
/// number of times. Infinite feedback is always rejected.
pub struct Annealing {
    set: Arc<ConfigurationSet>,
    rng: fastrand::Rng,
    budget: usize,
    initial_temperature: f64,
    /// Accepted state: enumeration index and its measured time.
    state: Option<(usize, f64)>,
    candidate: usize,
    trace: SearchTrace,
}

impl Annealing {
    pub fn new(
        set: Arc<ConfigurationSet>,
        fraction: f64,
        initial_temperature: f64,
        seed: Option<u64>,
    ) -> Self {
        let seed = seed.unwrap_or_else(seed_from_clock);
        let mut rng = fastrand::Rng::with_seed(seed);
        let budget = sample_budget(fraction, set.len());
        let candidate = rng.usize(..set.len());
        Self {
            set,
            rng,
            budget,
            initial_temperature,
            state: None,
            candidate,
            trace: SearchTrace::new(Some(seed)),
        }
    }

    fn temperature(&self, step: usize) -> f64 {
        self.initial_temperature * (1.0 - step as f64 / self.budget as f64)
    }

    /// Metropolis rule: strictly better is always taken, worse is taken with
    /// probability `exp(Δ/T)`.
    fn accepts(&mut self, candidate_time: f64, step: usize) -> bool {
        if !candidate_time.is_finite() {
            return false;
        }
        let Some((_, state_time)) = self.state else {
            return true;
        };
        if candidate_time < state_time {
            return true;
        }
        let temperature = self.temperature(step);
        if temperature <= 0.0 {
            return false;
        }
        let probability = ((state_time - candidate_time) / temperature).exp();
        self.rng.f64() < probability
    }

    fn propose_neighbor(&mut self, from: usize) -> usize {
        let parameters = self.set.parameters();
        let mutable: Vec<usize> = parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.len() > 1)
            .map(|(axis, _)| axis)
            .collect();
        if mutable.is_empty() {
            return from;
        }

        let current = self.set.value_indices(from);
        for _ in 0..MAX_NEIGHBOR_RETRIES {
            let axis = mutable[self.rng.usize(..mutable.len())];
            let mut value = self.rng.usize(..parameters[axis].len() - 1);
            if value >= current[axis] {
                value += 1;
            }
            let mut neighbor = current.to_vec();
            neighbor[axis] = value;
            if let Some(index) = self.set.position(&neighbor) {
                return index;
            }
        }
        from
    }
}

impl Searcher for Annealing {
    fn num_configurations(&self) -> usize {
        self.budget
    }

    fn current(&self) -> &Configuration {
        self.set.configuration(self.candidate)
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        let step = self.trace.len();
        let accepted = self.accepts(time_ms, step);
        if accepted {
            self.state = Some((self.candidate, time_ms));
        }
        self.trace.record(self.candidate, time_ms, accepted);
    }

    fn advance(&mut self) {
        match self.state {
            Some((index, _)) => self.candidate = self.propose_neighbor(index),
            // Nothing accepted yet (every candidate failed so far): restart
            // from a fresh uniform draw.
            None => self.candidate = self.rng.usize(..self.set.len()),
        }
    }

    fn write_log(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        self.trace.write(sink)
    }
}
