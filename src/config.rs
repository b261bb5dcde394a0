//! Run configuration for the guided local search.
//!
//! A [`GlsConfig`] can be built in code, derived from the instance size or
//! read from a JSON file. Command line flags override whatever the file sets.

use crate::error::{Result, TspError};
use crate::heuristics::construction::InitialTour;
use crate::heuristics::moves::{ImprovementPolicy, MoveOperator};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Accepted range for the penalty weight factor.
pub const BETA_MIN: f64 = 0.125;
pub const BETA_MAX: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlsConfig {
    pub operator: MoveOperator,
    pub policy: ImprovementPolicy,
    pub initial: InitialTour,
    /// `alpha = beta * best_length / n`
    pub beta: f64,
    /// Wall-clock budget in seconds
    pub time_limit: f64,
    /// Seconds without a new best before a perturbation restart
    pub stall_time: f64,
    pub max_restarts: usize,
    /// Random 2-opt moves applied by the first restart
    pub perturbation_moves: usize,
    /// Factor applied to the move count after each restart
    pub perturbation_growth: f64,
    /// Stop after this many search rounds
    pub max_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for GlsConfig {
    fn default() -> Self {
        GlsConfig {
            operator: MoveOperator::TwoOpt,
            policy: ImprovementPolicy::First,
            initial: InitialTour::NearestNeighbor,
            beta: 0.3,
            time_limit: 30.0,
            stall_time: 3.0,
            max_restarts: 5,
            perturbation_moves: 8,
            perturbation_growth: 1.5,
            max_rounds: None,
            seed: 42,
        }
    }
}

impl GlsConfig {
    /// Budgets scaled to the instance size.
    pub fn for_instance_size(n: usize) -> Self {
        let (time_limit, stall_time, perturbation_moves) = match n {
            0..=200 => (10.0, 1.0, 4),
            201..=2_000 => (30.0, 3.0, 8),
            2_001..=20_000 => (120.0, 10.0, 16),
            _ => (300.0, 30.0, 32),
        };
        // First improvement keeps sweeps cheap on large instances.
        let policy = if n <= 200 {
            ImprovementPolicy::Best
        } else {
            ImprovementPolicy::First
        };

        GlsConfig {
            policy,
            time_limit,
            stall_time,
            perturbation_moves,
            ..Default::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: GlsConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(BETA_MIN..=BETA_MAX).contains(&self.beta) {
            return Err(TspError::invalid_config(format!(
                "beta must lie in [{}, {}], got {}",
                BETA_MIN, BETA_MAX, self.beta
            )));
        }
        for (name, value) in [("time_limit", self.time_limit), ("stall_time", self.stall_time)] {
            if !value.is_finite() || value < 0.0 {
                return Err(TspError::invalid_config(format!(
                    "{} must be a finite non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if !self.perturbation_growth.is_finite() || self.perturbation_growth < 1.0 {
            return Err(TspError::invalid_config(format!(
                "perturbation_growth must be at least 1, got {}",
                self.perturbation_growth
            )));
        }
        Ok(())
    }

    /// Random moves applied by restart number `restart` (counted from 0) on
    /// an `n`-point tour. Never more than `n`.
    pub fn perturbation_size(&self, restart: usize, n: usize) -> usize {
        let exponent = restart.min(i32::MAX as usize) as i32;
        let scaled = self.perturbation_moves as f64 * self.perturbation_growth.powi(exponent);
        let moves = if scaled.is_finite() {
            scaled.round().max(1.0) as usize
        } else {
            usize::MAX
        };
        moves.min(n.max(1))
    }
}
