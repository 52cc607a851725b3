//! Particle-swarm optimization in discrete value-index space.

use crate::trace::SearchTrace;
use crate::{sample_budget, seed_from_clock, Searcher};
use std::io;
use std::sync::Arc;
use tuneforge_space::{Configuration, ConfigurationSet};

struct Particle {
    /// Per-parameter value indices; always a member of the valid enumeration.
    position: Vec<usize>,
    /// Per-parameter step in value-index space.
    velocity: Vec<f64>,
    /// Personal best position and its time.
    best: Option<(Vec<usize>, f64)>,
    /// Enumeration index of `position`.
    config_index: usize,
}

/// A swarm of particles whose positions are valid configurations and whose
/// velocities live in per-parameter value-index space.
///
/// The evaluation budget `⌈fraction · N⌉` is spread round-robin across the
/// swarm. After each evaluation the active particle moves:
/// `v ← w·v + c_local·r₁·(pb − x) + c_global·r₂·(gb − x)` per axis, position
/// advanced by rounded `v` clamped to the value-index range. A tentative
/// position outside the valid enumeration is projected onto the nearest valid
/// configuration by L1 distance in index space (ties toward the lower
/// enumeration index), falling back to a fresh uniform draw.
pub struct Pso {
    set: Arc<ConfigurationSet>,
    rng: fastrand::Rng,
    budget: usize,
    inertia: f64,
    cognitive: f64,
    social: f64,
    particles: Vec<Particle>,
    active: usize,
    global_best: Option<(Vec<usize>, f64)>,
    trace: SearchTrace,
}

impl Pso {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        set: Arc<ConfigurationSet>,
        fraction: f64,
        swarm_size: usize,
        inertia: f64,
        cognitive: f64,
        social: f64,
        seed: Option<u64>,
    ) -> Self {
        let seed = seed.unwrap_or_else(seed_from_clock);
        let mut rng = fastrand::Rng::with_seed(seed);
        let budget = sample_budget(fraction, set.len());

        let particles = (0..swarm_size.max(1))
            .map(|_| {
                let config_index = rng.usize(..set.len());
                Particle {
                    position: set.value_indices(config_index).to_vec(),
                    velocity: vec![0.0; set.parameters().len()],
                    best: None,
                    config_index,
                }
            })
            .collect();

        Self {
            set,
            rng,
            budget,
            inertia,
            cognitive,
            social,
            particles,
            active: 0,
            global_best: None,
            trace: SearchTrace::new(Some(seed)),
        }
    }

    /// Project a tentative index vector onto the valid enumeration.
    fn project(&mut self, target: &[usize]) -> usize {
        let mut best_index = None;
        let mut best_distance = usize::MAX;
        for i in 0..self.set.len() {
            let distance: usize = self
                .set
                .value_indices(i)
                .iter()
                .zip(target)
                .map(|(a, b)| a.abs_diff(*b))
                .sum();
            if distance < best_distance {
                best_distance = distance;
                best_index = Some(i);
            }
        }
        best_index.unwrap_or_else(|| self.rng.usize(..self.set.len()))
    }
}

impl Searcher for Pso {
    fn num_configurations(&self) -> usize {
        self.budget
    }

    fn current(&self) -> &Configuration {
        self.set.configuration(self.particles[self.active].config_index)
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        let particle = &mut self.particles[self.active];
        let finite = time_ms.is_finite();

        if finite
            && particle
                .best
                .as_ref()
                .map_or(true, |(_, best)| time_ms < *best)
        {
            particle.best = Some((particle.position.clone(), time_ms));
        }

        let improved_global = finite
            && self
                .global_best
                .as_ref()
                .map_or(true, |(_, best)| time_ms < *best);
        if improved_global {
            self.global_best = Some((particle.position.clone(), time_ms));
        }

        self.trace
            .record(particle.config_index, time_ms, improved_global);
    }

    fn advance(&mut self) {
        let parameters = self.set.parameters();
        let global_best = self
            .global_best
            .as_ref()
            .map(|(position, _)| position.clone());

        let particle = &mut self.particles[self.active];
        let personal_best = particle
            .best
            .as_ref()
            .map(|(position, _)| position.clone())
            .unwrap_or_else(|| particle.position.clone());
        let global_best = global_best.unwrap_or_else(|| particle.position.clone());

        let mut tentative = Vec::with_capacity(parameters.len());
        for axis in 0..parameters.len() {
            let r1 = self.rng.f64();
            let r2 = self.rng.f64();
            let x = particle.position[axis] as f64;
            let velocity = self.inertia * particle.velocity[axis]
                + self.cognitive * r1 * (personal_best[axis] as f64 - x)
                + self.social * r2 * (global_best[axis] as f64 - x);
            particle.velocity[axis] = velocity;
            let max_index = (parameters[axis].len() - 1) as f64;
            tentative.push((x + velocity).round().clamp(0.0, max_index) as usize);
        }

        let config_index = match self.set.position(&tentative) {
            Some(index) => index,
            None => self.project(&tentative),
        };
        let particle = &mut self.particles[self.active];
        particle.position = self.set.value_indices(config_index).to_vec();
        particle.config_index = config_index;

        self.active = (self.active + 1) % self.particles.len();
    }

    fn write_log(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        self.trace.write(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_device::DeviceInfo;
    use tuneforge_space::{Constraint, KernelSpace};

    fn constrained_set() -> Arc<ConfigurationSet> {
        let mut kernel = KernelSpace::new("k", "", vec![64], vec![1]).unwrap();
        kernel.add_parameter("A", vec![1, 2, 4, 8]).unwrap();
        kernel.add_parameter("B", vec![1, 2, 4, 8]).unwrap();
        kernel
            .add_constraint(Constraint::new(&["A", "B"], |v| v[0] <= v[1]))
            .unwrap();
        Arc::new(kernel.enumerate(&DeviceInfo::unbounded("t")).unwrap())
    }

    #[test]
    fn test_budget_is_fraction_of_valid_count() {
        let set = constrained_set();
        let n = set.len();
        let search = Pso::new(set, 0.5, 3, 0.4, 0.3, 0.3, Some(2));
        assert_eq!(search.num_configurations(), (n + 1) / 2);
    }

    #[test]
    fn test_positions_stay_inside_the_valid_enumeration() {
        let set = constrained_set();
        let mut search = Pso::new(Arc::clone(&set), 1.0, 3, 0.4, 0.3, 0.3, Some(9));
        for step in 0..search.num_configurations() {
            let config = search.current().clone();
            assert!(
                config.get("A").unwrap() <= config.get("B").unwrap(),
                "invalid position emitted at step {step}"
            );
            search.push_execution_time((step % 5) as f64 + 1.0);
            search.advance();
        }
    }

    #[test]
    fn test_global_best_tracks_minimum_finite_time() {
        let set = constrained_set();
        let mut search = Pso::new(set, 1.0, 2, 0.4, 0.3, 0.3, Some(4));
        let times = [7.0, f64::INFINITY, 3.0, 5.0, 2.5, f64::INFINITY];
        for &t in &times {
            search.push_execution_time(t);
            search.advance();
        }
        let (_, best) = search.global_best.as_ref().unwrap();
        assert_eq!(*best, 2.5);
        assert_eq!(search.trace.best_ms(), 2.5);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let drain = |seed| {
            let set = constrained_set();
            let mut search = Pso::new(set, 1.0, 3, 0.4, 0.3, 0.3, Some(seed));
            let mut log = Vec::new();
            for step in 0..search.num_configurations() {
                search.push_execution_time(((step * 7) % 11) as f64);
                search.advance();
            }
            search.write_log(&mut log).unwrap();
            log
        };
        assert_eq!(drain(21), drain(21));
    }
}
