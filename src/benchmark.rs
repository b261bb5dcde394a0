//! Benchmarking and experimentation module.
//!
//! Runs every move operator and improvement policy combination of the guided
//! local search several times per instance, collects the results and
//! summarises them per algorithm.

use crate::config::GlsConfig;
use crate::error::Result;
use crate::heuristics::construction::InitialTour;
use crate::heuristics::guided::GuidedLocalSearch;
use crate::heuristics::moves::{ImprovementPolicy, MoveOperator};
use crate::instance::TspInstance;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Result of running a single algorithm on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Algorithm name
    pub algorithm: String,
    /// Instance name
    pub instance: String,
    /// Instance dimension
    pub dimension: usize,
    /// Run index, also the seed
    pub run: usize,
    /// Length of the initial tour
    pub initial_cost: f64,
    /// Length of the best tour found
    pub cost: f64,
    /// Computation time in seconds
    pub time: f64,
    pub rounds: usize,
    pub restarts: usize,
    pub stop_reason: String,
    /// Gap to best known in percent (if available)
    pub gap_to_best: Option<f64>,
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    /// Algorithm name
    pub algorithm: String,
    /// Number of runs over all instances
    pub num_runs: usize,
    /// Average cost
    pub avg_cost: f64,
    /// Best cost
    pub best_cost: f64,
    /// Worst cost
    pub worst_cost: f64,
    /// Sample standard deviation of cost
    pub std_cost: f64,
    /// Average time
    pub avg_time: f64,
    /// Total time
    pub total_time: f64,
    /// Average gap to best known
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per algorithm and instance
    pub num_runs: usize,
    /// Time limit per run in seconds
    pub time_limit: f64,
    /// Round cap per run
    pub max_rounds: Option<usize>,
    /// Run independent runs in parallel
    pub parallel: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
    /// Output directory
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            time_limit: 60.0,
            max_rounds: None,
            parallel: true,
            show_progress: true,
            output_dir: "results".to_string(),
        }
    }
}

/// Every operator and policy combination.
pub fn variants() -> Vec<(MoveOperator, ImprovementPolicy)> {
    let mut variants = Vec::new();
    for operator in [MoveOperator::TwoOpt, MoveOperator::NodeSwap] {
        for policy in [ImprovementPolicy::First, ImprovementPolicy::Best] {
            variants.push((operator, policy));
        }
    }
    variants
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<AlgorithmResult>,
    best_known: HashMap<String, f64>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best_known: HashMap::new(),
        }
    }

    /// Search configuration for one run.
    fn run_config(
        &self,
        instance: &TspInstance,
        operator: MoveOperator,
        policy: ImprovementPolicy,
        run: usize,
    ) -> GlsConfig {
        GlsConfig {
            operator,
            policy,
            initial: InitialTour::RandomizedNn,
            time_limit: self.config.time_limit,
            max_rounds: self.config.max_rounds,
            seed: run as u64,
            ..GlsConfig::for_instance_size(instance.dimension())
        }
    }

    /// Run every variant `num_runs` times on an instance
    pub fn run_instance(&mut self, instance: &TspInstance) -> Result<()> {
        log::info!("Running benchmark on instance: {}", instance.name);

        let jobs: Vec<GlsConfig> = variants()
            .into_iter()
            .flat_map(|(operator, policy)| {
                (0..self.config.num_runs)
                    .map(move |run| (operator, policy, run))
            })
            .map(|(operator, policy, run)| self.run_config(instance, operator, policy, run))
            .collect();

        let progress = if self.config.show_progress {
            let bar = ProgressBar::new(jobs.len() as u64);
            if let Ok(style) =
                ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} {elapsed_precise}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_prefix(instance.name.clone());
            bar
        } else {
            ProgressBar::hidden()
        };

        let run_one = |config: &GlsConfig| -> Result<AlgorithmResult> {
            let report = GuidedLocalSearch::new(config.clone()).run(instance)?;
            let initial_cost = report
                .trace
                .first()
                .map_or(report.solution.cost, |&(_, length)| length);
            progress.inc(1);
            Ok(AlgorithmResult {
                algorithm: report.solution.algorithm.clone(),
                instance: instance.name.clone(),
                dimension: instance.dimension(),
                run: config.seed as usize,
                initial_cost,
                cost: report.solution.cost,
                time: report.solution.computation_time,
                rounds: report.rounds,
                restarts: report.restarts,
                stop_reason: report.stop_reason.to_string(),
                gap_to_best: None,
            })
        };

        let results: Result<Vec<AlgorithmResult>> = if self.config.parallel {
            jobs.par_iter().map(run_one).collect()
        } else {
            jobs.iter().map(run_one).collect()
        };
        let mut results = results?;
        progress.finish_and_clear();

        let found = results
            .iter()
            .map(|r| r.cost)
            .fold(f64::INFINITY, f64::min);
        let best = self
            .best_known
            .entry(instance.name.clone())
            .or_insert(found);
        if found < *best {
            *best = found;
        }
        let best = *best;

        for result in &mut results {
            if best > 0.0 {
                result.gap_to_best = Some((result.cost - best) / best * 100.0);
            }
        }
        self.results.extend(results);
        Ok(())
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[TspInstance]) -> Result<()> {
        for instance in instances {
            self.run_instance(instance)?;
        }
        Ok(())
    }

    /// Compute statistics for each algorithm
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut stats_map: HashMap<String, Vec<&AlgorithmResult>> = HashMap::new();

        for result in &self.results {
            stats_map
                .entry(result.algorithm.clone())
                .or_default()
                .push(result);
        }

        let mut statistics = Vec::new();

        for (algo, results) in stats_map {
            let costs: Vec<f64> = results.iter().map(|r| r.cost).collect();
            let times: Vec<f64> = results.iter().map(|r| r.time).collect();
            let gaps: Vec<f64> = results.iter().filter_map(|r| r.gap_to_best).collect();

            let std_cost = if costs.len() > 1 {
                costs.iter().std_dev()
            } else {
                0.0
            };

            statistics.push(AlgorithmStatistics {
                algorithm: algo,
                num_runs: results.len(),
                avg_cost: costs.iter().mean(),
                best_cost: costs.iter().cloned().fold(f64::INFINITY, f64::min),
                worst_cost: costs.iter().cloned().fold(0.0, f64::max),
                std_cost,
                avg_time: times.iter().mean(),
                total_time: times.iter().sum(),
                avg_gap: if gaps.is_empty() {
                    None
                } else {
                    Some(gaps.iter().mean())
                },
            });
        }

        statistics.sort_by(|a, b| a.avg_cost.total_cmp(&b.avg_cost));

        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Guided Local Search Benchmark\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        report.push_str(&format!(
            "Runs per variant: {}, time limit: {}s\n\n",
            self.config.num_runs, self.config.time_limit
        ));

        let stats = self.compute_statistics();

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>6} {:>12} {:>12} {:>10} {:>8} {:>10}\n",
            "Algorithm", "Runs", "Avg Cost", "Best Cost", "Std", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for stat in &stats {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<20} {:>6} {:>12.2} {:>12.2} {:>10.2} {:>8} {:>10.4}\n",
                stat.algorithm,
                stat.num_runs,
                stat.avg_cost,
                stat.best_cost,
                stat.std_cost,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");

        let mut instance_best: HashMap<&str, &AlgorithmResult> = HashMap::new();
        for result in &self.results {
            let entry = instance_best.entry(&result.instance).or_insert(result);
            if result.cost < entry.cost {
                *entry = result;
            }
        }

        let mut names: Vec<&str> = instance_best.keys().copied().collect();
        names.sort();
        for name in names {
            let best = instance_best[name];
            report.push_str(&format!(
                "  {} (n={}): {:.2} ({}, run {})\n",
                name, best.dimension, best.cost, best.algorithm, best.run
            ));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[AlgorithmResult] {
        &self.results
    }
}

/// Helper function to load instances from a directory.
///
/// Reads `.tsp` files and extension-less point-list files; anything that
/// fails to parse is skipped with a warning.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Vec<TspInstance> {
    let mut instances = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let wanted = match path.extension() {
                Some(ext) => ext == "tsp",
                None => true,
            };
            if !wanted {
                continue;
            }
            match TspInstance::from_file(&path) {
                Ok(instance) => instances.push(instance),
                Err(e) => log::warn!("skipping {:?}: {}", path, e),
            }
        }
    }

    // Sort by dimension
    instances.sort_by(|a, b| {
        a.dimension()
            .cmp(&b.dimension())
            .then_with(|| a.name.cmp(&b.name))
    });

    instances
}
