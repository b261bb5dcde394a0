//! Solution representation for the Euclidean TSP.
//!
//! A [`Solution`] is the plain, serializable result of a heuristic: the
//! visiting order, its length and some bookkeeping about how it was found.

use crate::instance::TspInstance;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Represents a solution to the TSP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// The tour as a sequence of point ids, closing back to the first one
    pub tour: Vec<usize>,
    /// Total tour length
    pub cost: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            tour: Vec::new(),
            cost: f64::INFINITY,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Create a solution from a tour
    pub fn from_tour(instance: &TspInstance, tour: Vec<usize>, algorithm: &str) -> Self {
        let cost = instance.tour_length(&tour);
        Solution {
            tour,
            cost,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Check if every point is visited exactly once
    pub fn is_complete(&self, instance: &TspInstance) -> bool {
        let n = instance.dimension();
        if self.tour.len() != n {
            return false;
        }

        let unique: HashSet<usize> = self.tour.iter().copied().filter(|&p| p < n).collect();
        unique.len() == n
    }

    /// Length line followed by the visiting order:
    ///
    /// ```text
    /// 40.00 0
    /// 0 1 2 3
    /// ```
    pub fn to_output_string(&self) -> String {
        let ids: Vec<String> = self.tour.iter().map(|p| p.to_string()).collect();
        format!("{:.2} 0\n{}\n", self.cost, ids.join(" "))
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Length: {:.2}", self.cost)?;
        writeln!(f, "  Points: {}", self.tour.len())?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Tour: {:?}", self.tour)
    }
}
