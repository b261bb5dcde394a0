//! Points, canonical edges and the edge pool.
//!
//! Edges are undirected, so every edge is stored under an [`EdgeKey`] whose
//! first endpoint has the lower id. The [`EdgePool`] holds at most one [`Edge`]
//! per key for the whole run: length and penalty state survive as long as the
//! pool does.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A 2-D point with a stable id (its index in the instance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Point { id, x, y }
    }

    /// Euclidean distance.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Manhattan distance. Never below the Euclidean distance and never above
    /// `sqrt(2)` times it.
    #[inline]
    pub fn manhattan(&self, other: &Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Unordered pair of point ids, lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    a: usize,
    b: usize,
}

impl EdgeKey {
    #[inline]
    pub fn new(p: usize, q: usize) -> Self {
        if p <= q {
            EdgeKey { a: p, b: q }
        } else {
            EdgeKey { a: q, b: p }
        }
    }

    #[inline]
    pub fn first(&self) -> usize {
        self.a
    }

    #[inline]
    pub fn second(&self) -> usize {
        self.b
    }

    #[inline]
    pub fn contains(&self, p: usize) -> bool {
        self.a == p || self.b == p
    }

    /// The endpoint opposite to `p`.
    #[inline]
    pub fn other(&self, p: usize) -> usize {
        if self.a == p {
            self.b
        } else {
            self.a
        }
    }
}

/// A pooled edge: cached length plus guided-search penalty.
#[derive(Debug, Clone)]
pub struct Edge {
    key: EdgeKey,
    length: f64,
    penalty: u32,
}

impl Edge {
    fn new(key: EdgeKey, length: f64) -> Self {
        Edge {
            key,
            length,
            penalty: 0,
        }
    }

    #[inline]
    pub fn key(&self) -> EdgeKey {
        self.key
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn penalty(&self) -> u32 {
        self.penalty
    }

    /// `length / (1 + penalty)`. Well defined for zero-length edges.
    #[inline]
    pub fn utility(&self) -> f64 {
        self.length / (1.0 + self.penalty as f64)
    }

    /// Length in the augmented objective.
    #[inline]
    pub fn penalized_length(&self, alpha: f64) -> f64 {
        self.length + alpha * self.penalty as f64
    }

    #[inline]
    pub fn penalize(&mut self) {
        self.penalty = self.penalty.saturating_add(1);
    }

    #[inline]
    pub fn reset_penalty(&mut self) {
        self.penalty = 0;
    }
}

/// Memo of every edge requested during a run.
#[derive(Debug, Clone, Default)]
pub struct EdgePool {
    edges: HashMap<EdgeKey, Edge>,
}

impl EdgePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EdgePool {
            edges: HashMap::with_capacity(capacity),
        }
    }

    /// The canonical edge between `p` and `q`, created on first request.
    pub fn edge(&mut self, p: &Point, q: &Point) -> &mut Edge {
        let key = EdgeKey::new(p.id, q.id);
        self.edges
            .entry(key)
            .or_insert_with(|| Edge::new(key, p.distance(q)))
    }

    /// Existing edge, if it has been requested before.
    #[inline]
    pub fn get(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(key)
    }

    /// Penalty of `key`, zero for edges not in the pool yet.
    #[inline]
    pub fn penalty(&self, key: &EdgeKey) -> u32 {
        self.edges.get(key).map(|e| e.penalty).unwrap_or(0)
    }

    pub fn reset_penalties(&mut self) {
        for edge in self.edges.values_mut() {
            edge.reset_penalty();
        }
    }

    /// Sum of all penalties currently held.
    pub fn total_penalty(&self) -> u64 {
        self.edges.values().map(|e| e.penalty as u64).sum()
    }

    /// Number of pooled edges.
    pub(crate) fn len(&self) -> usize {
        self.edges.len()
    }
}
