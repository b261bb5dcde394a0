//! Guided Local Search solver for the Euclidean TSP
//!
//! A heuristic solver for the symmetric Travelling Salesman Problem on points
//! in the plane.
//!
//! # Features
//!
//! - Construction heuristics (input order, Nearest Neighbor, randomized Nearest Neighbor)
//! - Fast Local Search with 2-opt or node-swap moves and first or best improvement
//! - Guided Local Search with edge penalties and perturbation restarts
//! - Anytime runs bounded by a wall-clock deadline
//! - Benchmarking and visualization tools
//!
//! # Example
//!
//! ```no_run
//! use tsp_gls_solver::config::GlsConfig;
//! use tsp_gls_solver::heuristics::guided::GuidedLocalSearch;
//! use tsp_gls_solver::instance::TspInstance;
//!
//! // Load instance
//! let instance = TspInstance::from_file("tsp_51_1").unwrap();
//!
//! // Search with a budget suited to the instance
//! let config = GlsConfig::for_instance_size(instance.dimension());
//! let report = GuidedLocalSearch::new(config).run(&instance).unwrap();
//!
//! print!("{}", report.solution.to_output_string());
//! ```

pub mod benchmark;
pub mod config;
pub mod deadline;
pub mod error;
pub mod geometry;
pub mod heuristics;
pub mod instance;
pub mod solution;
pub mod tour;
pub mod visualization;

pub use config::GlsConfig;
pub use error::{Result, TspError};
pub use instance::TspInstance;
pub use solution::Solution;
