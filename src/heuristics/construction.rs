use crate::error::Result;
use crate::instance::TspInstance;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub trait ConstructionHeuristic {
    fn construct(&self, instance: &TspInstance) -> Solution;
    fn name(&self) -> &str;
}

/// Visits the points in input order.
pub struct SequentialHeuristic;

impl ConstructionHeuristic for SequentialHeuristic {
    fn construct(&self, instance: &TspInstance) -> Solution {
        let tour: Vec<usize> = (0..instance.dimension()).collect();
        Solution::from_tour(instance, tour, self.name())
    }

    fn name(&self) -> &str {
        "Sequential"
    }
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly visiting the nearest unvisited point.
/// The randomized variant picks uniformly among the three nearest.
pub struct NearestNeighborHeuristic {
    pub randomized: bool,
    pub seed: u64,
    /// Point the tour starts from
    pub start: usize,
}

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic {
            randomized: false,
            seed: 42,
            start: 0,
        }
    }

    pub fn randomized(seed: u64) -> Self {
        NearestNeighborHeuristic {
            randomized: true,
            seed,
            start: 0,
        }
    }

    pub fn starting_at(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    fn find_nearest(
        &self,
        instance: &TspInstance,
        current: usize,
        visited: &[bool],
        rng: &mut ChaCha8Rng,
    ) -> Option<usize> {
        let mut candidates: Vec<(usize, f64)> = (0..instance.dimension())
            .filter(|&p| !visited[p])
            .map(|p| (p, instance.distance(current, p)))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        if self.randomized && candidates.len() > 1 {
            candidates.sort_by_key(|&(_, d)| OrderedFloat(d));
            let top_k = candidates.len().min(3);
            let idx = rng.gen_range(0..top_k);
            Some(candidates[idx].0)
        } else {
            candidates
                .into_iter()
                .min_by_key(|&(_, d)| OrderedFloat(d))
                .map(|(p, _)| p)
        }
    }
}

impl Default for NearestNeighborHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, instance: &TspInstance) -> Solution {
        let start = std::time::Instant::now();
        let n = instance.dimension();
        if n == 0 {
            return Solution::from_tour(instance, Vec::new(), self.name());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let first = self.start.min(n - 1);
        let mut tour = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        tour.push(first);
        visited[first] = true;

        let mut current = first;
        while let Some(next) = self.find_nearest(instance, current, &visited, &mut rng) {
            tour.push(next);
            visited[next] = true;
            current = next;
        }

        let mut solution = Solution::from_tour(instance, tour, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        if self.randomized {
            "NearestNeighbor-Randomized"
        } else {
            "NearestNeighbor"
        }
    }
}

/// Initial tour selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialTour {
    Sequential,
    #[default]
    NearestNeighbor,
    /// Randomized nearest neighbour seeded with the run seed
    RandomizedNn,
}

impl InitialTour {
    /// Build the initial solution. Fails on instances the search rejects.
    pub fn build(&self, instance: &TspInstance, seed: u64) -> Result<Solution> {
        instance.validate()?;
        let solution = match self {
            InitialTour::Sequential => SequentialHeuristic.construct(instance),
            InitialTour::NearestNeighbor => NearestNeighborHeuristic::new().construct(instance),
            InitialTour::RandomizedNn => NearestNeighborHeuristic::randomized(seed).construct(instance),
        };
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TspError;

    fn line_instance() -> TspInstance {
        TspInstance::from_coordinates(
            "line",
            &[(0.0, 0.0), (30.0, 0.0), (10.0, 0.0), (20.0, 0.0), (40.0, 0.0)],
        )
    }

    #[test]
    fn test_sequential_keeps_input_order() {
        let instance = line_instance();
        let sol = SequentialHeuristic.construct(&instance);
        assert_eq!(sol.tour, vec![0, 1, 2, 3, 4]);
        assert!(sol.is_complete(&instance));
    }

    #[test]
    fn test_nearest_neighbor_follows_the_line() {
        let instance = line_instance();
        let sol = NearestNeighborHeuristic::new().construct(&instance);
        assert_eq!(sol.tour, vec![0, 2, 3, 1, 4]);
        assert!((sol.cost - 80.0).abs() < 1e-10);
    }

    #[test]
    fn test_randomized_nearest_neighbor_is_reproducible() {
        let coords: Vec<(f64, f64)> = (0..30)
            .map(|i| ((i * 37 % 101) as f64, (i * 53 % 97) as f64))
            .collect();
        let instance = TspInstance::from_coordinates("scatter", &coords);

        let a = NearestNeighborHeuristic::randomized(7).construct(&instance);
        let b = NearestNeighborHeuristic::randomized(7).construct(&instance);
        assert_eq!(a.tour, b.tour);
        assert!(a.is_complete(&instance));
    }

    #[test]
    fn test_initial_tour_rejects_degenerate_instances() {
        let instance = TspInstance::from_coordinates("pair", &[(0.0, 0.0), (1.0, 0.0)]);
        let err = InitialTour::NearestNeighbor.build(&instance, 0).unwrap_err();
        assert!(matches!(err, TspError::DegenerateInstance(2)));

        let ok = InitialTour::RandomizedNn.build(&line_instance(), 3).unwrap();
        assert!(ok.is_complete(&line_instance()));
    }
}
