//! Heuristics module for the Euclidean TSP.
//!
//! This module exports the construction heuristics, the edge-exchange move
//! generators and the local search drivers built on them.

pub mod construction;
pub mod guided;
pub mod local_search;
pub mod moves;

pub use construction::*;
pub use guided::*;
pub use local_search::*;
pub use moves::*;
