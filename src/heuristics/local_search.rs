//! Local search improvement heuristics.
//!
//! [`FastLocalSearch`] scans only "active" points: a point is switched off
//! when no improving move starts from it and switched back on when a move
//! or a penalty touches one of its edges. A sweep therefore costs work
//! proportional to the active frontier rather than to the whole tour.

use crate::deadline::Deadline;
use crate::error::Result;
use crate::heuristics::moves::{ImprovementPolicy, MoveGenerator, MoveOperator};
use crate::instance::TspInstance;
use crate::solution::Solution;
use crate::tour::Tour;

/// Trait for local search improvement methods
pub trait LocalSearch {
    /// Improve `solution` in place. Returns whether its cost went down.
    fn improve(&self, instance: &TspInstance, solution: &mut Solution) -> Result<bool>;
    fn name(&self) -> &str;
}

/// Result of one Fast Local Search call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlsOutcome {
    /// Moves applied
    pub moves: usize,
    /// Unpenalized tour length at exit
    pub length: f64,
    /// `true` when every point went inactive, `false` on timeout
    pub converged: bool,
}

/// Fast Local Search over a single move generator.
pub struct FastLocalSearch {
    generator: Box<dyn MoveGenerator + Send + Sync>,
    /// Time limit in seconds for [`LocalSearch::improve`]
    pub time_limit: f64,
}

impl FastLocalSearch {
    pub fn new(operator: MoveOperator, policy: ImprovementPolicy) -> Self {
        Self::with_generator(operator.generator(policy))
    }

    pub fn with_generator(generator: Box<dyn MoveGenerator + Send + Sync>) -> Self {
        FastLocalSearch {
            generator,
            time_limit: 60.0,
        }
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Sweep the active points until none is left or `deadline` passes,
    /// minimising the tour length augmented by `alpha` times the edge penalties.
    pub fn run(&self, tour: &mut Tour, alpha: f64, deadline: &Deadline) -> FlsOutcome {
        let n = tour.len();
        let mut moves = 0;

        while tour.has_active() {
            for pos in 0..n {
                if deadline.expired() {
                    return FlsOutcome {
                        moves,
                        length: tour.length(),
                        converged: false,
                    };
                }

                let base = tour.point_at(pos);
                if !tour.is_active(base) {
                    continue;
                }
                tour.deactivate(base);

                let Some(mv) = self.generator.propose(tour, base, alpha, deadline) else {
                    continue;
                };
                if !mv.is_improving() {
                    continue;
                }

                log::trace!("{}: {:?} delta {:.4}", self.generator.name(), mv.kind, mv.delta);
                tour.apply(&mv);
                for &p in &mv.touched {
                    tour.activate(p);
                }
                moves += 1;
            }
        }

        FlsOutcome {
            moves,
            length: tour.length(),
            converged: true,
        }
    }
}

impl Default for FastLocalSearch {
    fn default() -> Self {
        Self::new(MoveOperator::TwoOpt, ImprovementPolicy::First)
    }
}

impl LocalSearch for FastLocalSearch {
    fn improve(&self, instance: &TspInstance, solution: &mut Solution) -> Result<bool> {
        let start = std::time::Instant::now();
        let deadline = Deadline::from_secs_f64(self.time_limit);

        let sequence = if solution.is_complete(instance) {
            solution.tour.clone()
        } else {
            (0..instance.dimension()).collect()
        };
        let initial_cost = instance.tour_length(&sequence);
        let mut tour = Tour::new(instance, sequence)?;

        let outcome = self.run(&mut tour, 0.0, &deadline);
        let cost = instance.tour_length(tour.sequence());
        let improved = cost < initial_cost - 1e-9;

        solution.tour = tour.sequence().to_vec();
        solution.cost = cost;
        solution.iterations = Some(outcome.moves);
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(improved)
    }

    fn name(&self) -> &str {
        self.generator.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::moves::TwoOpt;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn random_instance(n: usize, seed: u64) -> TspInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|_| (rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();
        TspInstance::from_coordinates("random", &coords)
    }

    #[test]
    fn test_fls_reaches_a_two_opt_local_optimum() {
        let instance = random_instance(60, 17);
        let mut tour = Tour::new(&instance, (0..60).collect()).unwrap();
        let initial = tour.length();

        let fls = FastLocalSearch::new(MoveOperator::TwoOpt, ImprovementPolicy::First);
        let outcome = fls.run(&mut tour, 0.0, &Deadline::unbounded());

        assert!(outcome.converged);
        assert!(outcome.moves > 0);
        assert!(outcome.length < initial);
        assert!(!tour.has_active());
        assert!(tour.validate().is_ok());

        for base in 0..60 {
            for partner in 0..60 {
                if let Some(mv) = TwoOpt::exchange(&mut tour, base, partner, 0.0) {
                    assert!(!mv.is_improving(), "{} {} still improves", base, partner);
                }
            }
        }
    }

    #[test]
    fn test_fls_with_node_swap_best_improvement() {
        let instance = random_instance(40, 2);
        let mut tour = Tour::new(&instance, (0..40).collect()).unwrap();
        let initial = tour.length();

        let fls = FastLocalSearch::new(MoveOperator::NodeSwap, ImprovementPolicy::Best);
        let outcome = fls.run(&mut tour, 0.0, &Deadline::unbounded());
        assert!(outcome.converged);
        assert!(outcome.length <= initial);
        assert!(tour.validate().is_ok());
    }

    #[test]
    fn test_penalized_moves_keep_tour_valid() {
        let instance = random_instance(40, 23);
        let mut tour = Tour::new(&instance, (0..40).collect()).unwrap();
        FastLocalSearch::default().run(&mut tour, 0.0, &Deadline::unbounded());
        let alpha = 0.3 * tour.length() / 40.0;

        let mut applied = 0;
        for operator in [MoveOperator::TwoOpt, MoveOperator::NodeSwap] {
            let generator = operator.generator(ImprovementPolicy::Best);
            for _ in 0..5 {
                for key in tour.max_utility_edges() {
                    tour.penalize_edge(&key);
                }
                for pos in 0..40 {
                    let base = tour.point_at(pos);
                    let deadline = Deadline::unbounded();
                    let Some(mv) = generator.propose(&mut tour, base, alpha, &deadline) else {
                        continue;
                    };
                    let before = tour.length();
                    let length_delta = mv.length_delta(&tour);
                    tour.apply(&mv);
                    applied += 1;
                    assert!(tour.validate().is_ok(), "{} broke the tour", generator.name());
                    assert!((tour.length() - (before + length_delta)).abs() < 1e-6);
                    assert!((tour.length() - instance.tour_length(tour.sequence())).abs() < 1e-6);
                }
            }
        }
        assert!(applied > 0);

        let fls = FastLocalSearch::new(MoveOperator::TwoOpt, ImprovementPolicy::First);
        let outcome = fls.run(&mut tour, alpha, &Deadline::unbounded());
        assert!(outcome.converged);
        assert!(tour.validate().is_ok());
    }

    #[test]
    fn test_fls_respects_an_expired_deadline() {
        let instance = random_instance(30, 4);
        let mut tour = Tour::new(&instance, (0..30).collect()).unwrap();
        let before = tour.sequence().to_vec();

        let fls = FastLocalSearch::default();
        let outcome = fls.run(&mut tour, 0.0, &Deadline::from_secs_f64(0.0));
        assert!(!outcome.converged);
        assert_eq!(outcome.moves, 0);
        assert_eq!(tour.sequence(), before.as_slice());
    }

    #[test]
    fn test_improve_updates_the_solution() {
        let instance = random_instance(25, 9);
        let mut solution = Solution::from_tour(&instance, (0..25).collect(), "Sequential");
        let initial = solution.cost;

        let fls = FastLocalSearch::default().with_time_limit(10.0);
        let improved = fls.improve(&instance, &mut solution).unwrap();
        assert!(improved);
        assert!(solution.cost < initial);
        assert!(solution.is_complete(&instance));
        assert!((solution.cost - instance.tour_length(&solution.tour)).abs() < 1e-9);
        assert_eq!(fls.name(), "2-Opt-FI");
    }
}
