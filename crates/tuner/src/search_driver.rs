//! Instantiates the configured search strategy over an enumeration.

use crate::session::SearchMethod;
use std::sync::Arc;
use tuneforge_search::{Annealing, FullSearch, Pso, RandomSearch, Searcher};
use tuneforge_space::ConfigurationSet;

pub(crate) fn build_searcher(
    method: &SearchMethod,
    set: Arc<ConfigurationSet>,
    seed: Option<u64>,
) -> Box<dyn Searcher> {
    match *method {
        SearchMethod::Full => Box::new(FullSearch::new(set)),
        SearchMethod::Random { fraction } => Box::new(RandomSearch::new(set, fraction, seed)),
        SearchMethod::Annealing {
            fraction,
            temperature,
        } => Box::new(Annealing::new(set, fraction, temperature, seed)),
        SearchMethod::Pso {
            fraction,
            swarm_size,
            inertia,
            cognitive,
            social,
        } => Box::new(Pso::new(
            set, fraction, swarm_size, inertia, cognitive, social, seed,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_device::DeviceInfo;
    use tuneforge_space::KernelSpace;

    #[test]
    fn test_each_method_builds_with_the_right_budget() {
        let mut kernel = KernelSpace::new("k", "", vec![64], vec![1]).unwrap();
        kernel.add_parameter("V", (1..=10).collect()).unwrap();
        let set = Arc::new(kernel.enumerate(&DeviceInfo::unbounded("t")).unwrap());

        let full = build_searcher(&SearchMethod::Full, Arc::clone(&set), None);
        assert_eq!(full.num_configurations(), 10);

        let random = build_searcher(
            &SearchMethod::Random { fraction: 0.31 },
            Arc::clone(&set),
            Some(1),
        );
        assert_eq!(random.num_configurations(), 4);

        let annealing = build_searcher(
            &SearchMethod::Annealing {
                fraction: 0.31,
                temperature: 4.0,
            },
            Arc::clone(&set),
            Some(1),
        );
        assert_eq!(annealing.num_configurations(), 4);

        let pso = build_searcher(
            &SearchMethod::Pso {
                fraction: 0.31,
                swarm_size: 2,
                inertia: 0.4,
                cognitive: 0.3,
                social: 0.3,
            },
            set,
            Some(1),
        );
        assert_eq!(pso.num_configurations(), 4);
    }
}
