//! Guided Local Search.
//!
//! Each round runs [`FastLocalSearch`] on the objective
//!
//! ```text
//! length(tour) + alpha * sum(penalty(e) for e in tour),  alpha = beta * best_length / n
//! ```
//!
//! A round that does not improve the best tour penalizes every tour edge of
//! maximum utility `length / (1 + penalty)`, which pushes the search out of
//! the current local optimum. When no new best shows up for `stall_time`
//! seconds the search restarts from a randomly perturbed copy of the best tour
//! with all penalties cleared.

use crate::config::GlsConfig;
use crate::deadline::Deadline;
use crate::error::Result;
use crate::heuristics::local_search::{FastLocalSearch, LocalSearch};
use crate::heuristics::moves::{random_two_opt, IMPROVEMENT_EPS};
use crate::instance::TspInstance;
use crate::solution::Solution;
use crate::tour::Tour;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    TimeLimit,
    /// Stalled with no restarts left
    Converged,
    RoundLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::TimeLimit => "time limit",
            StopReason::Converged => "converged",
            StopReason::RoundLimit => "round limit",
        };
        f.write_str(s)
    }
}

/// Outcome of a guided local search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlsReport {
    /// Best tour found
    pub solution: Solution,
    pub rounds: usize,
    pub restarts: usize,
    /// Penalty increments applied over the whole run
    pub penalties: u64,
    /// `(seconds, length)` each time the best tour improved, starting with the initial tour
    pub trace: Vec<(f64, f64)>,
    pub stop_reason: StopReason,
}

pub struct GuidedLocalSearch {
    config: GlsConfig,
    name: String,
}

impl GuidedLocalSearch {
    pub fn new(config: GlsConfig) -> Self {
        let generator = config.operator.generator(config.policy);
        let name = format!("GLS-{}", generator.name());
        GuidedLocalSearch { config, name }
    }

    pub fn config(&self) -> &GlsConfig {
        &self.config
    }

    /// Build the configured initial tour and search from it.
    pub fn run(&self, instance: &TspInstance) -> Result<GlsReport> {
        self.config.validate()?;
        let deadline = Deadline::from_secs_f64(self.config.time_limit);
        let initial = self.config.initial.build(instance, self.config.seed)?;
        log::debug!("{}: initial length {:.2}", initial.algorithm, initial.cost);
        self.run_from(instance, initial.tour, &deadline)
    }

    /// Search from a given visiting order until `deadline` or another stop condition.
    pub fn run_from(
        &self,
        instance: &TspInstance,
        sequence: Vec<usize>,
        deadline: &Deadline,
    ) -> Result<GlsReport> {
        self.config.validate()?;
        let config = &self.config;
        let start = Instant::now();
        let n = instance.dimension();

        let mut tour = Tour::new(instance, sequence)?;
        let fls = FastLocalSearch::new(config.operator, config.policy);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let stall = Duration::from_secs_f64(config.stall_time);

        let mut best_sequence = tour.sequence().to_vec();
        let mut best_length = tour.length();
        let mut trace = vec![(0.0, best_length)];
        let mut last_improvement = Instant::now();
        let mut rounds = 0;
        let mut restarts = 0;
        let mut penalties = 0u64;

        log::info!(
            "{} on {} ({} points), initial length {:.2}",
            self.name,
            instance.name,
            n,
            best_length
        );

        let stop_reason = loop {
            if deadline.expired() {
                break StopReason::TimeLimit;
            }
            if config.max_rounds.map_or(false, |max| rounds >= max) {
                break StopReason::RoundLimit;
            }
            rounds += 1;

            let alpha = config.beta * best_length / n as f64;
            let outcome = fls.run(&mut tour, alpha, deadline);

            if outcome.length < best_length - IMPROVEMENT_EPS {
                best_length = outcome.length;
                best_sequence.copy_from_slice(tour.sequence());
                trace.push((start.elapsed().as_secs_f64(), best_length));
                last_improvement = Instant::now();
                log::debug!(
                    "round {}: new best {:.2} after {} moves",
                    rounds,
                    best_length,
                    outcome.moves
                );
                continue;
            }
            if !outcome.converged {
                continue;
            }

            if last_improvement.elapsed() >= stall {
                if restarts >= config.max_restarts {
                    break StopReason::Converged;
                }
                let moves = config.perturbation_size(restarts, n);
                restarts += 1;
                perturb(&mut tour, &best_sequence, moves, &mut rng, deadline)?;
                last_improvement = Instant::now();
                log::info!(
                    "restart {}/{}: {} random 2-opt moves from best {:.2}",
                    restarts,
                    config.max_restarts,
                    moves,
                    best_length
                );
                continue;
            }

            let keys = tour.max_utility_edges();
            for key in &keys {
                tour.penalize_edge(key);
            }
            penalties += keys.len() as u64;
            log::debug!(
                "round {}: penalized {} edge(s), tour length {:.2}",
                rounds,
                keys.len(),
                outcome.length
            );
        };

        log::debug!("edge pool holds {} edges", tour.pool().len());

        let mut solution = Solution::from_tour(instance, best_sequence, &self.name);
        solution.computation_time = start.elapsed().as_secs_f64();
        solution.iterations = Some(rounds);

        log::info!(
            "{} stopped ({}): length {:.2} after {} rounds, {} restarts, {:.2}s",
            self.name,
            stop_reason,
            solution.cost,
            rounds,
            restarts,
            solution.computation_time
        );

        Ok(GlsReport {
            solution,
            rounds,
            restarts,
            penalties,
            trace,
            stop_reason,
        })
    }
}

/// Reset `tour` to `best`, scramble it with up to `moves` random 2-opt
/// exchanges and clear every penalty. Scrambling stops early once `deadline`
/// expires.
fn perturb<R: Rng>(
    tour: &mut Tour,
    best: &[usize],
    moves: usize,
    rng: &mut R,
    deadline: &Deadline,
) -> Result<()> {
    tour.reset_to(best)?;
    for _ in 0..moves {
        if deadline.expired() {
            break;
        }
        if let Some(mv) = random_two_opt(tour, rng) {
            tour.apply(&mv);
        }
    }
    tour.reset_penalties();
    tour.activate_all();
    Ok(())
}

impl LocalSearch for GuidedLocalSearch {
    fn improve(&self, instance: &TspInstance, solution: &mut Solution) -> Result<bool> {
        let deadline = Deadline::from_secs_f64(self.config.time_limit);
        let report = if solution.is_complete(instance) {
            self.run_from(instance, solution.tour.clone(), &deadline)?
        } else {
            self.run(instance)?
        };

        let improved = report.solution.cost < solution.cost - 1e-9;
        if improved {
            *solution = report.solution;
        }
        Ok(improved)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TspError;
    use crate::heuristics::construction::InitialTour;
    use crate::heuristics::moves::{ImprovementPolicy, MoveOperator};

    fn square() -> TspInstance {
        TspInstance::from_coordinates(
            "square",
            &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)],
        )
    }

    fn random_instance(n: usize, seed: u64) -> TspInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|_| (rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();
        TspInstance::from_coordinates("random", &coords)
    }

    fn capped(rounds: usize) -> GlsConfig {
        GlsConfig {
            time_limit: 30.0,
            stall_time: 1000.0,
            max_rounds: Some(rounds),
            ..Default::default()
        }
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut result = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn test_square_converges_from_any_order() {
        let instance = square();
        for operator in [MoveOperator::TwoOpt, MoveOperator::NodeSwap] {
            let gls = GuidedLocalSearch::new(GlsConfig {
                operator,
                ..capped(20)
            });
            for order in permutations(&[0, 1, 2, 3]) {
                let report = gls
                    .run_from(&instance, order.clone(), &Deadline::unbounded())
                    .unwrap();
                assert_eq!(report.stop_reason, StopReason::RoundLimit);
                assert!(
                    report.solution.to_output_string().starts_with("40.00 0\n"),
                    "{:?} with {} gave {}",
                    order,
                    operator,
                    report.solution.cost
                );
            }
        }
    }

    #[test]
    fn test_zero_budget_returns_the_initial_tour() {
        let instance = random_instance(50, 1);
        let gls = GuidedLocalSearch::new(GlsConfig::default());
        let order: Vec<usize> = (0..50).rev().collect();

        let report = gls
            .run_from(&instance, order.clone(), &Deadline::from_secs_f64(0.0))
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::TimeLimit);
        assert_eq!(report.rounds, 0);
        assert_eq!(report.solution.tour, order);
        assert!(report.solution.is_complete(&instance));

        let zero = GuidedLocalSearch::new(GlsConfig {
            time_limit: 0.0,
            ..Default::default()
        });
        let report = zero.run(&instance).unwrap();
        assert!(report.solution.is_complete(&instance));
    }

    #[test]
    fn test_trace_is_monotonic() {
        let instance = random_instance(60, 5);
        let gls = GuidedLocalSearch::new(GlsConfig {
            initial: InitialTour::Sequential,
            ..capped(200)
        });
        let report = gls.run(&instance).unwrap();

        assert!(report.trace.len() > 1);
        for pair in report.trace.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
            assert!(pair[1].1 < pair[0].1);
        }
        let last = report.trace.last().unwrap().1;
        assert!((last - report.solution.cost).abs() < 1e-6 * last);
        assert!(report.penalties > 0);
    }

    #[test]
    fn test_guided_search_beats_plain_descent() {
        let instance = random_instance(80, 21);
        let start: Vec<usize> = (0..80).collect();

        let mut tour = Tour::new(&instance, start.clone()).unwrap();
        let descent = FastLocalSearch::default().run(&mut tour, 0.0, &Deadline::unbounded());

        let gls = GuidedLocalSearch::new(capped(300));
        let report = gls.run_from(&instance, start, &Deadline::unbounded()).unwrap();
        assert!(report.solution.cost <= descent.length + 1e-9);
    }

    #[test]
    fn test_restarts_until_converged() {
        let instance = random_instance(30, 8);
        let gls = GuidedLocalSearch::new(GlsConfig {
            stall_time: 0.0,
            max_restarts: 3,
            time_limit: 30.0,
            policy: ImprovementPolicy::Best,
            ..Default::default()
        });
        let report = gls.run(&instance).unwrap();
        assert_eq!(report.stop_reason, StopReason::Converged);
        assert_eq!(report.restarts, 3);
        assert!(report.solution.is_complete(&instance));
    }

    #[test]
    fn test_runaway_perturbation_growth_stays_within_budget() {
        let instance = random_instance(20, 6);
        let config = GlsConfig {
            time_limit: 0.5,
            stall_time: 0.0,
            max_restarts: 200,
            perturbation_growth: 1000.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let start = Instant::now();
        let report = GuidedLocalSearch::new(config).run(&instance).unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(report.solution.is_complete(&instance));
    }

    #[test]
    fn test_perturb_resets_penalties_and_keeps_tour_valid() {
        let instance = random_instance(30, 12);
        let best: Vec<usize> = (0..30).collect();
        let mut tour = Tour::new(&instance, best.clone()).unwrap();
        for key in tour.max_utility_edges() {
            tour.penalize_edge(&key);
        }
        let far = tour.edge(0, 15);
        tour.penalize_edge(&far);
        assert!(tour.pool().total_penalty() > 0);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        perturb(&mut tour, &best, 10, &mut rng, &Deadline::unbounded()).unwrap();
        assert!(tour.validate().is_ok());
        assert_eq!(tour.pool().total_penalty(), 0);
        assert_eq!(tour.active_count(), 30);
        assert!((tour.length() - instance.tour_length(tour.sequence())).abs() < 1e-6);

        perturb(&mut tour, &best, 10, &mut rng, &Deadline::from_secs_f64(0.0)).unwrap();
        assert!(tour.validate().is_ok());
        assert_eq!(tour.sequence(), best.as_slice());
    }

    #[test]
    fn test_round_cap_is_reproducible() {
        let instance = random_instance(40, 13);
        let config = GlsConfig {
            initial: InitialTour::RandomizedNn,
            seed: 99,
            ..capped(60)
        };
        let a = GuidedLocalSearch::new(config.clone()).run(&instance).unwrap();
        let b = GuidedLocalSearch::new(config).run(&instance).unwrap();
        assert_eq!(a.rounds, 60);
        assert_eq!(a.solution.tour, b.solution.tour);
        assert_eq!(a.penalties, b.penalties);
    }

    #[test]
    fn test_rejects_bad_input() {
        let pair = TspInstance::from_coordinates("pair", &[(0.0, 0.0), (1.0, 1.0)]);
        let gls = GuidedLocalSearch::new(GlsConfig::default());
        assert!(matches!(gls.run(&pair), Err(TspError::DegenerateInstance(2))));

        let bad_beta = GuidedLocalSearch::new(GlsConfig {
            beta: 0.9,
            ..Default::default()
        });
        assert!(matches!(bad_beta.run(&square()), Err(TspError::InvalidConfig(_))));
    }

    #[test]
    fn test_triangle_is_returned_as_is() {
        let triangle =
            TspInstance::from_coordinates("triangle", &[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        let report = GuidedLocalSearch::new(capped(5)).run(&triangle).unwrap();
        assert!((report.solution.cost - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_improve_through_trait() {
        let instance = random_instance(25, 3);
        let mut solution = Solution::from_tour(&instance, (0..25).collect(), "Sequential");
        let gls = GuidedLocalSearch::new(capped(50));
        assert!(gls.improve(&instance, &mut solution).unwrap());
        assert!(solution.is_complete(&instance));
        assert_eq!(gls.name(), "GLS-2-Opt-FI");
    }
}
