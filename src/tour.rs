//! The mutable cyclic tour searched by the local search drivers.
//!
//! A [`Tour`] keeps the visiting order as a flat sequence plus its inverse
//! (`positions`), the set of edges realised by consecutive points, the running
//! length of those edges and one "active" flag per point. It also owns the
//! [`EdgePool`] so every layer of the search reads and penalizes the same edges.

use crate::error::{Result, TspError};
use crate::geometry::{Edge, EdgeKey, EdgePool, Point};
use crate::heuristics::moves::{MoveKind, ProposedMove};
use crate::instance::TspInstance;
use std::collections::HashSet;

/// Relative tolerance used when checking the running length.
const LENGTH_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct Tour {
    points: Vec<Point>,
    sequence: Vec<usize>,
    positions: Vec<usize>,
    edges: HashSet<EdgeKey>,
    length: f64,
    active: Vec<bool>,
    active_count: usize,
    pool: EdgePool,
}

impl Tour {
    /// Build a tour visiting `sequence` in order. All points start active.
    pub fn new(instance: &TspInstance, sequence: Vec<usize>) -> Result<Self> {
        instance.validate()?;
        let n = instance.dimension();
        check_permutation(&sequence, n)?;

        let mut tour = Tour {
            points: instance.points.clone(),
            sequence: Vec::new(),
            positions: vec![0; n],
            edges: HashSet::with_capacity(n),
            length: 0.0,
            active: vec![true; n],
            active_count: n,
            pool: EdgePool::with_capacity(4 * n),
        };
        tour.rebuild(sequence);
        Ok(tour)
    }

    /// Replace the visiting order, keeping the edge pool and its penalties.
    /// Every point becomes active again.
    pub fn reset_to(&mut self, sequence: &[usize]) -> Result<()> {
        check_permutation(sequence, self.points.len())?;
        self.rebuild(sequence.to_vec());
        self.activate_all();
        Ok(())
    }

    fn rebuild(&mut self, sequence: Vec<usize>) {
        let n = sequence.len();
        self.sequence = sequence;
        for (pos, &p) in self.sequence.iter().enumerate() {
            self.positions[p] = pos;
        }
        self.edges.clear();
        self.length = 0.0;
        for pos in 0..n {
            let key = self.edge(self.sequence[pos], self.sequence[(pos + 1) % n]);
            self.add_edge_to_tour(key);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Current tour length (unpenalized).
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    #[inline]
    pub fn point(&self, p: usize) -> &Point {
        &self.points[p]
    }

    #[inline]
    pub fn point_at(&self, pos: usize) -> usize {
        self.sequence[pos]
    }

    #[inline]
    pub fn position(&self, p: usize) -> usize {
        self.positions[p]
    }

    #[inline]
    pub fn successor(&self, p: usize) -> usize {
        let pos = self.positions[p];
        if pos + 1 == self.sequence.len() {
            self.sequence[0]
        } else {
            self.sequence[pos + 1]
        }
    }

    #[inline]
    pub fn predecessor(&self, p: usize) -> usize {
        let pos = self.positions[p];
        if pos == 0 {
            self.sequence[self.sequence.len() - 1]
        } else {
            self.sequence[pos - 1]
        }
    }

    /// `(predecessor, successor)` of `p` in traversal order. The point at
    /// position 0 gets the point at position n-1 as predecessor, and the point
    /// at n-1 gets position 0 as successor.
    #[inline]
    pub fn neighbors(&self, p: usize) -> (usize, usize) {
        (self.predecessor(p), self.successor(p))
    }

    /// Whether `key` is one of the current tour edges.
    #[inline]
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains(key)
    }

    // ---- edge pool ----------------------------------------------------------

    /// Canonical pooled edge between `p` and `q`, created if needed.
    pub fn edge(&mut self, p: usize, q: usize) -> EdgeKey {
        let (a, b) = (self.points[p], self.points[q]);
        self.pool.edge(&a, &b).key()
    }

    /// Pooled edge for `key`. Panics if the edge was never requested.
    #[inline]
    pub fn edge_data(&self, key: &EdgeKey) -> &Edge {
        self.pool.get(key).expect("edge requested before it was pooled")
    }

    #[inline]
    pub fn pool(&self) -> &EdgePool {
        &self.pool
    }

    /// Penalized length of a pooled edge.
    #[inline]
    pub fn penalized_length(&self, key: &EdgeKey, alpha: f64) -> f64 {
        self.edge_data(key).penalized_length(alpha)
    }

    /// Increment the penalty of `key` and wake up both endpoints.
    pub fn penalize_edge(&mut self, key: &EdgeKey) {
        if let Some(edge) = self.pool.get_mut(key) {
            edge.penalize();
        }
        self.activate(key.first());
        self.activate(key.second());
    }

    pub fn reset_penalties(&mut self) {
        self.pool.reset_penalties();
    }

    /// Tour edges whose utility equals the maximum utility over the tour.
    pub fn max_utility_edges(&self) -> Vec<EdgeKey> {
        let mut best = f64::NEG_INFINITY;
        let mut keys = Vec::new();
        for key in &self.edges {
            let utility = self.edge_data(key).utility();
            if utility > best {
                best = utility;
                keys.clear();
                keys.push(*key);
            } else if utility == best {
                keys.push(*key);
            }
        }
        keys.sort();
        keys
    }

    // ---- edge set -----------------------------------------------------------

    /// Add a pooled edge to the tour edge set and to the running length.
    pub fn add_edge_to_tour(&mut self, key: EdgeKey) {
        if self.edges.insert(key) {
            self.length += self.edge_data(&key).length();
        }
    }

    /// Remove an edge from the tour edge set and from the running length.
    pub fn remove_edge_from_tour(&mut self, key: EdgeKey) {
        if self.edges.remove(&key) {
            self.length -= self.edge_data(&key).length();
        }
    }

    // ---- sequence -----------------------------------------------------------

    /// Exchange the positions of two points.
    pub fn swap_nodes(&mut self, a: usize, b: usize) {
        let (pa, pb) = (self.positions[a], self.positions[b]);
        self.sequence.swap(pa, pb);
        self.positions[a] = pb;
        self.positions[b] = pa;
    }

    /// Reverse the cyclic run of positions `from..=to`, wrapping across the
    /// seam when `from > to`. The shorter side of the cycle is the one actually
    /// reversed; both give the same set of edges.
    pub fn reverse_segment(&mut self, from: usize, to: usize) {
        let n = self.sequence.len();
        let mut i = from;
        let mut j = to;
        let mut len = (to + n - from) % n + 1;

        if 2 * len > n {
            i = (to + 1) % n;
            j = (from + n - 1) % n;
            len = n - len;
        }

        for _ in 0..len / 2 {
            let (a, b) = (self.sequence[i], self.sequence[j]);
            self.sequence[i] = b;
            self.sequence[j] = a;
            self.positions[b] = i;
            self.positions[a] = j;
            i = (i + 1) % n;
            j = (j + n - 1) % n;
        }
    }

    /// Realise a proposed move: edge set, length and visiting order.
    /// Activation of the touched points is left to the caller.
    pub fn apply(&mut self, mv: &ProposedMove) {
        for &key in &mv.removed {
            self.remove_edge_from_tour(key);
        }
        for &key in &mv.added {
            self.add_edge_to_tour(key);
        }

        match mv.kind {
            MoveKind::TwoOpt { base, partner } => {
                let from = self.position(self.successor(base));
                let to = self.position(partner);
                self.reverse_segment(from, to);
            }
            MoveKind::NodeSwap { a, b } => self.swap_nodes(a, b),
        }
    }

    // ---- activity -----------------------------------------------------------

    #[inline]
    pub fn is_active(&self, p: usize) -> bool {
        self.active[p]
    }

    #[inline]
    pub fn has_active(&self) -> bool {
        self.active_count > 0
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    #[inline]
    pub fn activate(&mut self, p: usize) {
        if !self.active[p] {
            self.active[p] = true;
            self.active_count += 1;
        }
    }

    #[inline]
    pub fn deactivate(&mut self, p: usize) {
        if self.active[p] {
            self.active[p] = false;
            self.active_count -= 1;
        }
    }

    pub fn activate_all(&mut self) {
        self.active.iter_mut().for_each(|a| *a = true);
        self.active_count = self.active.len();
    }

    // ---- checks -------------------------------------------------------------

    /// Check every structural invariant of the tour.
    pub fn validate(&self) -> Result<()> {
        let n = self.points.len();
        check_permutation(&self.sequence, n)?;

        for (pos, &p) in self.sequence.iter().enumerate() {
            if self.positions[p] != pos {
                return Err(TspError::invalid_tour(format!(
                    "point {} is at position {} but indexed at {}",
                    p, pos, self.positions[p]
                )));
            }
        }

        let expected: HashSet<EdgeKey> = (0..n)
            .map(|pos| EdgeKey::new(self.sequence[pos], self.sequence[(pos + 1) % n]))
            .collect();
        if expected != self.edges {
            return Err(TspError::invalid_tour(
                "tour edges differ from the consecutive pairs of the sequence",
            ));
        }

        let sum: f64 = self
            .edges
            .iter()
            .map(|key| self.points[key.first()].distance(&self.points[key.second()]))
            .sum();
        if (sum - self.length).abs() > LENGTH_TOLERANCE * sum.max(1.0) {
            return Err(TspError::invalid_tour(format!(
                "running length {} differs from edge sum {}",
                self.length, sum
            )));
        }

        let active = self.active.iter().filter(|&&a| a).count();
        if active != self.active_count {
            return Err(TspError::invalid_tour(format!(
                "active counter {} but {} points are active",
                self.active_count, active
            )));
        }
        Ok(())
    }
}

/// Ensure `sequence` visits every point of `0..n` exactly once.
pub fn check_permutation(sequence: &[usize], n: usize) -> Result<()> {
    if sequence.len() != n {
        return Err(TspError::invalid_tour(format!(
            "tour has {} entries, expected {}",
            sequence.len(),
            n
        )));
    }
    let mut seen = vec![false; n];
    for &p in sequence {
        if p >= n {
            return Err(TspError::invalid_tour(format!("point {} out of range", p)));
        }
        if seen[p] {
            return Err(TspError::invalid_tour(format!("point {} visited twice", p)));
        }
        seen[p] = true;
    }
    Ok(())
}
