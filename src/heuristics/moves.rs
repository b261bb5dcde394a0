//! Edge-exchange move generators.
//!
//! A generator looks at one base point of the tour and proposes the edge
//! exchange it likes best (or the first improving one) together with its delta
//! in the augmented objective:
//!
//! ```text
//! delta = sum(length + alpha * penalty) over added - same over removed
//! ```
//!
//! Proposals never change the visiting order; the only side effect is that the
//! edges they add get pooled.

use crate::deadline::Deadline;
use crate::geometry::EdgeKey;
use crate::tour::Tour;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// A move must lower the augmented objective by more than this to be accepted.
pub const IMPROVEMENT_EPS: f64 = 1e-7;

/// Candidates scanned between two deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Which improving candidate a generator returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImprovementPolicy {
    /// Stop at the first improving candidate
    #[default]
    First,
    /// Scan every candidate and keep the best
    Best,
}

/// Shape of an edge exchange, by point id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Replace `(base, succ base)` and `(partner, succ partner)` with
    /// `(base, partner)` and `(succ base, succ partner)`.
    TwoOpt { base: usize, partner: usize },
    /// Exchange the tour positions of `a` and `b`.
    NodeSwap { a: usize, b: usize },
}

/// An evaluated, not yet applied, edge exchange.
#[derive(Debug, Clone)]
pub struct ProposedMove {
    pub kind: MoveKind,
    /// Change of the penalized tour length.
    pub delta: f64,
    pub removed: Vec<EdgeKey>,
    pub added: Vec<EdgeKey>,
    /// Endpoints of every removed or added edge, without duplicates.
    pub touched: Vec<usize>,
}

impl ProposedMove {
    #[inline]
    pub fn is_improving(&self) -> bool {
        self.delta < -IMPROVEMENT_EPS
    }

    /// Change of the plain (unpenalized) length.
    pub fn length_delta(&self, tour: &Tour) -> f64 {
        let added: f64 = self.added.iter().map(|k| tour.edge_data(k).length()).sum();
        let removed: f64 = self.removed.iter().map(|k| tour.edge_data(k).length()).sum();
        added - removed
    }
}

/// Proposes the move to make from a base point.
pub trait MoveGenerator {
    /// Best (or first) improving move with `base` as one endpoint, if any.
    /// Stops scanning when `deadline` expires and returns what it has.
    fn propose(
        &self,
        tour: &mut Tour,
        base: usize,
        alpha: f64,
        deadline: &Deadline,
    ) -> Option<ProposedMove>;

    fn name(&self) -> &str;
}

/// Move operator selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveOperator {
    #[default]
    TwoOpt,
    NodeSwap,
}

impl MoveOperator {
    pub fn generator(&self, policy: ImprovementPolicy) -> Box<dyn MoveGenerator + Send + Sync> {
        match self {
            MoveOperator::TwoOpt => Box::new(TwoOpt::new(policy)),
            MoveOperator::NodeSwap => Box::new(NodeSwap::new(policy)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MoveOperator::TwoOpt => "2-Opt",
            MoveOperator::NodeSwap => "NodeSwap",
        }
    }
}

impl std::fmt::Display for MoveOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Price an exchange. With `prune` set, candidates whose Manhattan lower bound
/// already rules out `delta < -IMPROVEMENT_EPS` are dropped before any added
/// edge is pooled.
fn evaluate(
    tour: &mut Tour,
    kind: MoveKind,
    removed: Vec<EdgeKey>,
    added_pairs: &[(usize, usize)],
    alpha: f64,
    prune: bool,
) -> Option<ProposedMove> {
    let removed_cost: f64 = removed
        .iter()
        .map(|k| tour.penalized_length(k, alpha))
        .sum();

    if prune {
        // Euclidean >= Manhattan / sqrt(2) and penalties are non-negative.
        let manhattan: f64 = added_pairs
            .iter()
            .map(|&(a, b)| tour.point(a).manhattan(tour.point(b)))
            .sum();
        if manhattan / SQRT_2 - removed_cost >= -IMPROVEMENT_EPS {
            return None;
        }
    }

    let added: Vec<EdgeKey> = added_pairs.iter().map(|&(a, b)| tour.edge(a, b)).collect();
    let added_cost: f64 = added.iter().map(|k| tour.penalized_length(k, alpha)).sum();

    let mut touched: Vec<usize> = removed
        .iter()
        .chain(added.iter())
        .flat_map(|k| [k.first(), k.second()])
        .collect();
    touched.sort_unstable();
    touched.dedup();

    Some(ProposedMove {
        kind,
        delta: added_cost - removed_cost,
        removed,
        added,
        touched,
    })
}

/// Shared candidate loop: walks every partner of `base` in tour order.
fn scan<F>(
    tour: &mut Tour,
    base: usize,
    policy: ImprovementPolicy,
    deadline: &Deadline,
    mut candidate: F,
) -> Option<ProposedMove>
where
    F: FnMut(&mut Tour, usize) -> Option<ProposedMove>,
{
    let n = tour.len();
    let start = tour.position(base);
    let mut best: Option<ProposedMove> = None;

    for offset in 1..n {
        if offset % DEADLINE_CHECK_INTERVAL == 0 && deadline.expired() {
            break;
        }
        let partner = tour.point_at((start + offset) % n);
        let Some(mv) = candidate(tour, partner) else {
            continue;
        };
        if !mv.is_improving() {
            continue;
        }
        if policy == ImprovementPolicy::First {
            return Some(mv);
        }
        if best.as_ref().map_or(true, |b| mv.delta < b.delta) {
            best = Some(mv);
        }
    }

    best
}

/// 2-opt: remove two tour edges and reconnect by reversing the path between them.
pub struct TwoOpt {
    pub policy: ImprovementPolicy,
}

impl TwoOpt {
    pub fn new(policy: ImprovementPolicy) -> Self {
        TwoOpt { policy }
    }

    /// A partner that yields a real exchange: not `base`, not adjacent to it.
    #[inline]
    pub fn is_valid(tour: &Tour, base: usize, partner: usize) -> bool {
        partner != base && partner != tour.successor(base) && tour.successor(partner) != base
    }

    /// Price the exchange between `base` and `partner` without pruning.
    pub fn exchange(
        tour: &mut Tour,
        base: usize,
        partner: usize,
        alpha: f64,
    ) -> Option<ProposedMove> {
        Self::candidate(tour, base, partner, alpha, false)
    }

    fn candidate(
        tour: &mut Tour,
        base: usize,
        partner: usize,
        alpha: f64,
        prune: bool,
    ) -> Option<ProposedMove> {
        if !Self::is_valid(tour, base, partner) {
            return None;
        }
        let base_next = tour.successor(base);
        let partner_next = tour.successor(partner);

        let removed = vec![
            EdgeKey::new(base, base_next),
            EdgeKey::new(partner, partner_next),
        ];
        let added = [(base, partner), (base_next, partner_next)];

        evaluate(
            tour,
            MoveKind::TwoOpt { base, partner },
            removed,
            &added,
            alpha,
            prune,
        )
    }
}

impl Default for TwoOpt {
    fn default() -> Self {
        Self::new(ImprovementPolicy::First)
    }
}

impl MoveGenerator for TwoOpt {
    fn propose(
        &self,
        tour: &mut Tour,
        base: usize,
        alpha: f64,
        deadline: &Deadline,
    ) -> Option<ProposedMove> {
        scan(tour, base, self.policy, deadline, |tour, partner| {
            Self::candidate(tour, base, partner, alpha, true)
        })
    }

    fn name(&self) -> &str {
        match self.policy {
            ImprovementPolicy::First => "2-Opt-FI",
            ImprovementPolicy::Best => "2-Opt-BI",
        }
    }
}

/// Node swap: exchange the positions of two points.
pub struct NodeSwap {
    pub policy: ImprovementPolicy,
}

impl NodeSwap {
    pub fn new(policy: ImprovementPolicy) -> Self {
        NodeSwap { policy }
    }

    /// Price swapping `a` and `b` without pruning.
    pub fn exchange(tour: &mut Tour, a: usize, b: usize, alpha: f64) -> Option<ProposedMove> {
        Self::candidate(tour, a, b, alpha, false)
    }

    fn candidate(
        tour: &mut Tour,
        a: usize,
        b: usize,
        alpha: f64,
        prune: bool,
    ) -> Option<ProposedMove> {
        if a == b {
            return None;
        }
        let (a_prev, a_next) = tour.neighbors(a);
        let (b_prev, b_next) = tour.neighbors(b);
        let kind = MoveKind::NodeSwap { a, b };

        if b == a_next {
            // a_prev, a, b, b_next
            let removed = vec![EdgeKey::new(a_prev, a), EdgeKey::new(b, b_next)];
            let added = [(a_prev, b), (a, b_next)];
            evaluate(tour, kind, removed, &added, alpha, prune)
        } else if b == a_prev {
            // b_prev, b, a, a_next
            let removed = vec![EdgeKey::new(b_prev, b), EdgeKey::new(a, a_next)];
            let added = [(b_prev, a), (b, a_next)];
            evaluate(tour, kind, removed, &added, alpha, prune)
        } else {
            let removed = vec![
                EdgeKey::new(a_prev, a),
                EdgeKey::new(a, a_next),
                EdgeKey::new(b_prev, b),
                EdgeKey::new(b, b_next),
            ];
            let added = [(a_prev, b), (b, a_next), (b_prev, a), (a, b_next)];
            evaluate(tour, kind, removed, &added, alpha, prune)
        }
    }
}

impl Default for NodeSwap {
    fn default() -> Self {
        Self::new(ImprovementPolicy::First)
    }
}

impl MoveGenerator for NodeSwap {
    fn propose(
        &self,
        tour: &mut Tour,
        base: usize,
        alpha: f64,
        deadline: &Deadline,
    ) -> Option<ProposedMove> {
        scan(tour, base, self.policy, deadline, |tour, partner| {
            Self::candidate(tour, base, partner, alpha, true)
        })
    }

    fn name(&self) -> &str {
        match self.policy {
            ImprovementPolicy::First => "Swap-FI",
            ImprovementPolicy::Best => "Swap-BI",
        }
    }
}

/// A uniformly random 2-opt exchange, whatever its cost. `None` below four
/// points, where no 2-opt exchange exists.
pub fn random_two_opt<R: Rng>(tour: &mut Tour, rng: &mut R) -> Option<ProposedMove> {
    let n = tour.len();
    if n < 4 {
        return None;
    }
    let base = tour.point_at(rng.gen_range(0..n));
    let offset = rng.gen_range(2..=n - 2);
    let partner = tour.point_at((tour.position(base) + offset) % n);
    TwoOpt::exchange(tour, base, partner, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::instance::TspInstance;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pentagon() -> TspInstance {
        let coords: Vec<(f64, f64)> = (0..5)
            .map(|k| {
                let angle = 2.0 * std::f64::consts::PI / 5.0 * k as f64;
                (100.0 * angle.cos(), 100.0 * angle.sin())
            })
            .collect();
        TspInstance::from_coordinates("pentagon", &coords)
    }

    fn random_instance(n: usize, seed: u64) -> TspInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|_| (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
            .collect();
        TspInstance::from_coordinates("random", &coords)
    }

    fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }

    fn segments_cross(a: &Point, b: &Point, c: &Point, d: &Point) -> bool {
        let o1 = orientation(a, b, c);
        let o2 = orientation(a, b, d);
        let o3 = orientation(c, d, a);
        let o4 = orientation(c, d, b);
        o1 * o2 < 0.0 && o3 * o4 < 0.0
    }

    fn has_crossing(tour: &Tour) -> bool {
        let n = tour.len();
        for i in 0..n {
            for j in i + 2..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let a = tour.point(tour.point_at(i));
                let b = tour.point(tour.point_at(i + 1));
                let c = tour.point(tour.point_at(j));
                let d = tour.point(tour.point_at((j + 1) % n));
                if segments_cross(a, b, c, d) {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn test_two_opt_untangles_pentagon() {
        let instance = pentagon();
        let mut tour = Tour::new(&instance, vec![0, 2, 1, 3, 4]).unwrap();
        assert!(has_crossing(&tour));

        let before = tour.length();
        let expected = instance.distance(0, 1) + instance.distance(2, 3)
            - instance.distance(0, 2)
            - instance.distance(1, 3);

        let mv = TwoOpt::exchange(&mut tour, 0, 1, 0.0).unwrap();
        assert!((mv.delta - expected).abs() < 1e-9);
        assert!(mv.is_improving());
        assert_eq!(mv.touched, vec![0, 1, 2, 3]);

        tour.apply(&mv);
        assert!(tour.validate().is_ok());
        assert!((tour.length() - (before + expected)).abs() < 1e-9);
        assert!((tour.length() - instance.tour_length(&[0, 1, 2, 3, 4])).abs() < 1e-9);
        assert!(!has_crossing(&tour));
    }

    #[test]
    fn test_two_opt_rejects_adjacent_partners() {
        let instance = pentagon();
        let mut tour = Tour::new(&instance, vec![0, 1, 2, 3, 4]).unwrap();
        assert!(TwoOpt::exchange(&mut tour, 0, 0, 0.0).is_none());
        assert!(TwoOpt::exchange(&mut tour, 0, 1, 0.0).is_none());
        assert!(TwoOpt::exchange(&mut tour, 0, 4, 0.0).is_none());
        assert!(TwoOpt::exchange(&mut tour, 0, 2, 0.0).is_some());
    }

    #[test]
    fn test_two_opt_across_the_seam() {
        let instance = pentagon();
        // (1, 3) crosses (2, 4). From base 2 the reversal runs from position 3
        // through the seam to position 0.
        let mut tour = Tour::new(&instance, vec![1, 3, 2, 4, 0]).unwrap();
        let before = tour.length();
        let generator = TwoOpt::new(ImprovementPolicy::Best);
        let mv = generator
            .propose(&mut tour, 2, 0.0, &Deadline::unbounded())
            .unwrap();
        let delta = mv.delta;
        tour.apply(&mv);
        assert!(tour.validate().is_ok());
        assert!((tour.length() - (before + delta)).abs() < 1e-9);
    }

    #[test]
    fn test_node_swap_on_square() {
        let instance = TspInstance::from_coordinates(
            "square",
            &[(0.0, 0.0), (10.0, 10.0), (0.0, 10.0), (10.0, 0.0)],
        );
        let mut tour = Tour::new(&instance, vec![0, 1, 2, 3]).unwrap();
        let generator = NodeSwap::new(ImprovementPolicy::Best);
        let mv = generator
            .propose(&mut tour, 1, 0.0, &Deadline::unbounded())
            .unwrap();
        tour.apply(&mv);
        assert!(tour.validate().is_ok());
        assert!((tour.length() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_node_swap_cases_keep_tour_valid() {
        let instance = random_instance(9, 3);
        let mut tour = Tour::new(&instance, (0..9).collect()).unwrap();
        // One apart, adjacent both ways, far apart, then adjacent across the seam.
        for &(a, b) in &[(1, 3), (3, 2), (5, 4), (0, 6), (8, 6)] {
            let before = tour.length();
            let mv = NodeSwap::exchange(&mut tour, a, b, 0.0).unwrap();
            let delta = mv.delta;
            tour.apply(&mv);
            assert!(tour.validate().is_ok(), "swap {} {} broke the tour", a, b);
            assert!((tour.length() - (before + delta)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_penalties_enter_the_delta() {
        let instance = pentagon();
        let mut tour = Tour::new(&instance, vec![0, 2, 1, 3, 4]).unwrap();
        let plain = TwoOpt::exchange(&mut tour, 0, 1, 0.0).unwrap().delta;

        let key = tour.edge(0, 1);
        tour.penalize_edge(&key);
        let penalized = TwoOpt::exchange(&mut tour, 0, 1, 2.5).unwrap();
        assert!((penalized.delta - (plain + 2.5)).abs() < 1e-9);
        assert!((penalized.length_delta(&tour) - plain).abs() < 1e-9);
    }

    #[test]
    fn test_pruning_keeps_the_best_improving_move() {
        let instance = random_instance(40, 11);
        let mut tour = Tour::new(&instance, (0..40).collect()).unwrap();
        let generator = TwoOpt::new(ImprovementPolicy::Best);

        for base in 0..40 {
            let exhaustive = (0..40)
                .filter_map(|q| TwoOpt::exchange(&mut tour, base, q, 0.0))
                .filter(|mv| mv.is_improving())
                .map(|mv| mv.delta)
                .fold(f64::INFINITY, f64::min);

            let proposed = generator.propose(&mut tour, base, 0.0, &Deadline::unbounded());
            match proposed {
                Some(mv) => assert!((mv.delta - exhaustive).abs() < 1e-9),
                None => assert!(exhaustive.is_infinite()),
            }
        }
    }

    #[test]
    fn test_pruning_keeps_the_best_improving_move_under_penalties() {
        let instance = random_instance(40, 19);
        let mut tour = Tour::new(&instance, (0..40).collect()).unwrap();
        let alpha = 0.3 * tour.length() / 40.0;

        for _ in 0..3 {
            for key in tour.max_utility_edges() {
                tour.penalize_edge(&key);
            }
        }
        for &(a, b) in &[(0, 7), (3, 21), (10, 33), (5, 6)] {
            let key = tour.edge(a, b);
            tour.penalize_edge(&key);
            tour.penalize_edge(&key);
        }

        for operator in [MoveOperator::TwoOpt, MoveOperator::NodeSwap] {
            let generator = operator.generator(ImprovementPolicy::Best);
            for base in 0..40 {
                let exhaustive = (0..40)
                    .filter_map(|q| match operator {
                        MoveOperator::TwoOpt => TwoOpt::exchange(&mut tour, base, q, alpha),
                        MoveOperator::NodeSwap => NodeSwap::exchange(&mut tour, base, q, alpha),
                    })
                    .filter(|mv| mv.is_improving())
                    .map(|mv| mv.delta)
                    .fold(f64::INFINITY, f64::min);

                let proposed = generator.propose(&mut tour, base, alpha, &Deadline::unbounded());
                match proposed {
                    Some(mv) => assert!(
                        (mv.delta - exhaustive).abs() < 1e-9,
                        "{} from {}: {} vs {}",
                        operator,
                        base,
                        mv.delta,
                        exhaustive
                    ),
                    None => assert!(exhaustive.is_infinite(), "{} from {}", operator, base),
                }
            }
        }
    }

    #[test]
    fn test_first_improvement_returns_an_improving_move() {
        let instance = random_instance(30, 5);
        let mut tour = Tour::new(&instance, (0..30).collect()).unwrap();
        let generator = NodeSwap::new(ImprovementPolicy::First);
        let mut found = false;
        for base in 0..30 {
            if let Some(mv) = generator.propose(&mut tour, base, 0.0, &Deadline::unbounded()) {
                assert!(mv.is_improving());
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_random_two_opt() {
        let instance = random_instance(12, 8);
        let mut tour = Tour::new(&instance, (0..12).collect()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            let mv = random_two_opt(&mut tour, &mut rng).unwrap();
            tour.apply(&mv);
        }
        assert!(tour.validate().is_ok());

        let small = TspInstance::from_coordinates("tri", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        let mut tri = Tour::new(&small, vec![0, 1, 2]).unwrap();
        assert!(random_two_opt(&mut tri, &mut rng).is_none());
    }
}
