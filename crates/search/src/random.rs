//! Uniform random sampling without replacement.

use crate::trace::SearchTrace;
use crate::{sample_budget, seed_from_clock, Searcher};
use std::io;
use std::sync::Arc;
use tuneforge_space::{Configuration, ConfigurationSet};

/// Draws `⌈fraction · N⌉` distinct configurations uniformly, in randomized
/// order. Feedback only updates the trace.
pub struct RandomSearch {
    set: Arc<ConfigurationSet>,
    order: Vec<usize>,
    position: usize,
    trace: SearchTrace,
}

impl RandomSearch {
    pub fn new(set: Arc<ConfigurationSet>, fraction: f64, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(seed_from_clock);
        let mut rng = fastrand::Rng::with_seed(seed);
        let n = set.len();
        let budget = sample_budget(fraction, n);

        // Partial Fisher-Yates: the first `budget` slots end up holding a
        // uniform sample without replacement.
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..budget {
            let j = i + rng.usize(..n - i);
            pool.swap(i, j);
        }
        pool.truncate(budget);

        Self {
            set,
            order: pool,
            position: 0,
            trace: SearchTrace::new(Some(seed)),
        }
    }
}

impl Searcher for RandomSearch {
    fn num_configurations(&self) -> usize {
        self.order.len()
    }

    fn current(&self) -> &Configuration {
        self.set.configuration(self.order[self.position])
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        self.trace.record(self.order[self.position], time_ms, true);
    }

    fn advance(&mut self) {
        if self.position + 1 < self.order.len() {
            self.position += 1;
        }
    }

    fn write_log(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        self.trace.write(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tuneforge_device::DeviceInfo;
    use tuneforge_space::KernelSpace;

    fn set_of(n_values: usize) -> Arc<ConfigurationSet> {
        let mut kernel = KernelSpace::new("k", "", vec![64], vec![1]).unwrap();
        kernel
            .add_parameter("V", (1..=n_values).collect())
            .unwrap();
        Arc::new(kernel.enumerate(&DeviceInfo::unbounded("t")).unwrap())
    }

    #[test]
    fn test_budget_is_fraction_of_valid_count() {
        let search = RandomSearch::new(set_of(10), 0.33, Some(7));
        assert_eq!(search.num_configurations(), 4); // ⌈0.33 · 10⌉
    }

    #[test]
    fn test_samples_are_distinct() {
        let mut search = RandomSearch::new(set_of(12), 0.75, Some(99));
        let mut seen = HashSet::new();
        for _ in 0..search.num_configurations() {
            assert!(seen.insert(search.current().clone()));
            search.push_execution_time(1.0);
            search.advance();
        }
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn test_same_seed_same_order() {
        let drain = |seed| {
            let mut search = RandomSearch::new(set_of(16), 0.5, Some(seed));
            let mut out = Vec::new();
            for _ in 0..search.num_configurations() {
                out.push(search.current().clone());
                search.push_execution_time(1.0);
                search.advance();
            }
            out
        };
        assert_eq!(drain(42), drain(42));
        assert_ne!(drain(42), drain(43));
    }
}
