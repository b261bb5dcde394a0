//! TSP GLS Solver - Command Line Interface
//!
//! Guided Local Search for the Euclidean Travelling Salesman Problem.

use clap::{Parser, Subcommand, ValueEnum};
use tsp_gls_solver::benchmark::{load_instances_from_dir, variants, Benchmark, BenchmarkConfig};
use tsp_gls_solver::config::GlsConfig;
use tsp_gls_solver::heuristics::construction::{
    ConstructionHeuristic, InitialTour, NearestNeighborHeuristic,
};
use tsp_gls_solver::heuristics::guided::GuidedLocalSearch;
use tsp_gls_solver::heuristics::local_search::{FastLocalSearch, LocalSearch};
use tsp_gls_solver::heuristics::moves::{ImprovementPolicy, MoveOperator};
use tsp_gls_solver::instance::TspInstance;
use tsp_gls_solver::solution::Solution;
use tsp_gls_solver::visualization::{generate_comparison_data, Visualizer};
use tsp_gls_solver::Result;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tsp-gls-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Guided Local Search solver for the Euclidean TSP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance and print the tour on stdout
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// Edge-exchange move
        #[arg(long, value_enum)]
        operator: Option<Operator>,

        /// Improvement policy of the move scan
        #[arg(long, value_enum)]
        policy: Option<Policy>,

        /// Initial tour construction
        #[arg(long, value_enum)]
        initial: Option<Initial>,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Seconds without improvement before a restart
        #[arg(long)]
        stall_time: Option<f64>,

        /// Maximum number of perturbation restarts
        #[arg(long)]
        restarts: Option<usize>,

        /// Penalty weight factor, between 0.125 and 0.5
        #[arg(long)]
        beta: Option<f64>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// JSON configuration file, overridden by the flags above
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output solution to file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate tour and trace visualizations
        #[arg(long)]
        visualize: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs per variant
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,

        /// Run one search at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Compare move operators and policies on an instance
    Compare {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Number of runs
        #[arg(short, long, default_value = "10")]
        runs: usize,

        /// Time limit per run
        #[arg(short, long, default_value = "10")]
        time_limit: f64,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Operator {
    /// Reverse a tour segment
    TwoOpt,
    /// Exchange two points
    NodeSwap,
}

impl From<Operator> for MoveOperator {
    fn from(op: Operator) -> Self {
        match op {
            Operator::TwoOpt => MoveOperator::TwoOpt,
            Operator::NodeSwap => MoveOperator::NodeSwap,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Policy {
    /// Apply the first improving move
    First,
    /// Scan all candidates, apply the best
    Best,
}

impl From<Policy> for ImprovementPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::First => ImprovementPolicy::First,
            Policy::Best => ImprovementPolicy::Best,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Initial {
    /// Input order
    Sequential,
    /// Nearest Neighbor from point 0
    NearestNeighbor,
    /// Nearest Neighbor picking among the 3 closest
    RandomizedNn,
}

impl From<Initial> for InitialTour {
    fn from(initial: Initial) -> Self {
        match initial {
            Initial::Sequential => InitialTour::Sequential,
            Initial::NearestNeighbor => InitialTour::NearestNeighbor,
            Initial::RandomizedNn => InitialTour::RandomizedNn,
        }
    }
}

/// Flags of `solve` that override the configuration.
struct SolveOverrides {
    operator: Option<Operator>,
    policy: Option<Policy>,
    initial: Option<Initial>,
    time_limit: Option<f64>,
    stall_time: Option<f64>,
    restarts: Option<usize>,
    beta: Option<f64>,
    seed: Option<u64>,
}

impl SolveOverrides {
    fn apply(self, config: &mut GlsConfig) {
        if let Some(op) = self.operator {
            config.operator = op.into();
        }
        if let Some(policy) = self.policy {
            config.policy = policy.into();
        }
        if let Some(initial) = self.initial {
            config.initial = initial.into();
        }
        if let Some(t) = self.time_limit {
            config.time_limit = t;
        }
        if let Some(t) = self.stall_time {
            config.stall_time = t;
        }
        if let Some(k) = self.restarts {
            config.max_restarts = k;
        }
        if let Some(beta) = self.beta {
            config.beta = beta;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve {
            instance,
            operator,
            policy,
            initial,
            time_limit,
            stall_time,
            restarts,
            beta,
            seed,
            config,
            output,
            visualize,
            verbose,
        } => {
            let overrides = SolveOverrides {
                operator,
                policy,
                initial,
                time_limit,
                stall_time,
                restarts,
                beta,
                seed,
            };
            solve_instance(&instance, overrides, config, output, visualize, verbose)
        }

        Commands::Benchmark {
            dir,
            output,
            runs,
            time_limit,
            max_size,
            sequential,
        } => run_benchmark(&dir, &output, runs, time_limit, max_size, sequential),

        Commands::Analyze { instance } => analyze_instance(&instance),

        Commands::Compare {
            instance,
            runs,
            time_limit,
            output,
        } => compare_algorithms(&instance, runs, time_limit, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn solve_instance(
    path: &Path,
    overrides: SolveOverrides,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    visualize: bool,
    verbose: bool,
) -> Result<()> {
    let instance = TspInstance::from_file(path)?;
    instance.validate()?;

    let mut config = match config_path {
        Some(p) => GlsConfig::from_json_file(p)?,
        None => GlsConfig::for_instance_size(instance.dimension()),
    };
    overrides.apply(&mut config);
    config.validate()?;

    if verbose {
        eprintln!("{}", instance.statistics());
        eprintln!("Configuration: {:?}", config);
    }

    let gls = GuidedLocalSearch::new(config);
    let report = gls.run(&instance)?;
    let solution = &report.solution;

    print!("{}", solution.to_output_string());

    if verbose {
        eprintln!("\n========== Results ==========");
        eprintln!("Algorithm: {}", solution.algorithm);
        eprintln!("Length: {:.2}", solution.cost);
        if let Some(&(_, initial)) = report.trace.first() {
            eprintln!(
                "Initial length: {:.2} ({:.2}% improvement)",
                initial,
                (initial - solution.cost) / initial * 100.0
            );
        }
        eprintln!("Stop reason: {}", report.stop_reason);
        eprintln!("Rounds: {}", report.rounds);
        eprintln!("Restarts: {}", report.restarts);
        eprintln!("Penalties applied: {}", report.penalties);
        eprintln!("Improvements: {}", report.trace.len().saturating_sub(1));
        eprintln!("Time: {:.4}s", solution.computation_time);
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&out_path, json)?;
        eprintln!("Solution saved to {:?}", out_path);
    }

    if visualize {
        let viz = Visualizer::new();
        let tour_svg = viz.generate_svg(&instance, solution);
        save_figure(&viz, &tour_svg, &path.with_extension("png"))?;
        let trace_svg = viz.generate_trace_svg(&report.trace);
        save_figure(&viz, &trace_svg, &path.with_extension("trace.png"))?;
    }

    Ok(())
}

/// Save a PNG, falling back to the SVG source when no converter works.
fn save_figure(viz: &Visualizer, svg: &str, png_path: &Path) -> Result<()> {
    match viz.save_png(svg, png_path) {
        Ok(()) => eprintln!("Visualization saved to {:?}", png_path),
        Err(e) => {
            let svg_path = png_path.with_extension("svg");
            viz.save_svg(svg, &svg_path)?;
            eprintln!("PNG conversion failed ({}). Saved SVG to {:?}", e, svg_path);
        }
    }
    Ok(())
}

fn run_benchmark(
    dir: &Path,
    output: &Path,
    runs: usize,
    time_limit: f64,
    max_size: Option<usize>,
    sequential: bool,
) -> Result<()> {
    println!("Loading instances from {:?}...", dir);

    let mut instances = load_instances_from_dir(dir);

    if let Some(max) = max_size {
        instances.retain(|i| i.dimension() <= max);
    }

    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    std::fs::create_dir_all(output)?;

    let config = BenchmarkConfig {
        num_runs: runs,
        time_limit,
        parallel: !sequential,
        output_dir: output.to_string_lossy().to_string(),
        ..Default::default()
    };

    let mut benchmark = Benchmark::new(config);

    for (i, instance) in instances.iter().enumerate() {
        println!(
            "\n[{}/{}] Processing {} (n={})...",
            i + 1,
            instances.len(),
            instance.name,
            instance.dimension()
        );

        benchmark.run_instance(instance)?;
    }

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(path: &Path) -> Result<()> {
    let instance = TspInstance::from_file(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());
    instance.validate()?;

    let n = instance.dimension();
    if n <= 2_000 {
        let mut all_distances: Vec<f64> = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                all_distances.push(instance.distance(i, j));
            }
        }

        let avg_dist = all_distances.iter().sum::<f64>() / all_distances.len() as f64;
        let min_dist = all_distances.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_dist = all_distances.iter().cloned().fold(0.0, f64::max);

        println!("Distance Statistics:");
        println!("  Average: {:.2}", avg_dist);
        println!("  Min: {:.2}", min_dist);
        println!("  Max: {:.2}", max_dist);
    }

    let nn_sol = NearestNeighborHeuristic::new().construct(&instance);

    let mut fls_sol = nn_sol.clone();
    let fls = FastLocalSearch::default().with_time_limit(5.0);
    fls.improve(&instance, &mut fls_sol)?;

    println!("\nQuick Solution Estimates:");
    println!("  Nearest Neighbor: {:.2}", nn_sol.cost);
    println!(
        "  Nearest Neighbor + {}: {:.2} ({:.4}s)",
        fls.name(),
        fls_sol.cost,
        fls_sol.computation_time
    );

    let suggested = GlsConfig::for_instance_size(n);
    println!(
        "\nSuggested run: time limit {}s, stall time {}s, policy {:?}",
        suggested.time_limit, suggested.stall_time, suggested.policy
    );

    Ok(())
}

fn compare_algorithms(
    path: &Path,
    runs: usize,
    time_limit: f64,
    output: Option<PathBuf>,
) -> Result<()> {
    let instance = TspInstance::from_file(path)?;
    instance.validate()?;

    println!(
        "Comparing variants on {} (n={})...\n",
        instance.name,
        instance.dimension()
    );

    let mut results: Vec<(String, Vec<Solution>)> = Vec::new();

    for (operator, policy) in variants() {
        let mut solutions = Vec::new();
        let mut name = String::new();

        print!("Testing {} / {:?}... ", operator, policy);
        std::io::Write::flush(&mut std::io::stdout())?;

        for seed in 0..runs as u64 {
            let config = GlsConfig {
                operator,
                policy,
                time_limit,
                seed,
                initial: InitialTour::RandomizedNn,
                ..GlsConfig::for_instance_size(instance.dimension())
            };
            let gls = GuidedLocalSearch::new(config);
            name = gls.name().to_string();
            solutions.push(gls.run(&instance)?.solution);
        }

        if solutions.is_empty() {
            println!("no runs");
        } else {
            let avg_cost = solutions.iter().map(|s| s.cost).sum::<f64>() / solutions.len() as f64;
            let avg_time =
                solutions.iter().map(|s| s.computation_time).sum::<f64>() / solutions.len() as f64;
            println!(
                "avg={:.2}, best={:.2}, time={:.4}s",
                avg_cost,
                solutions.iter().map(|s| s.cost).fold(f64::INFINITY, f64::min),
                avg_time
            );
        }

        results.push((name, solutions));
    }

    println!("\n========== Summary ==========");
    println!(
        "{:<15} {:>10} {:>10} {:>10} {:>10}",
        "Algorithm", "Best", "Average", "Worst", "Avg Time"
    );
    println!("{}", "-".repeat(60));

    for (name, solutions) in &results {
        if solutions.is_empty() {
            continue;
        }
        let costs: Vec<f64> = solutions.iter().map(|s| s.cost).collect();
        let best = costs.iter().cloned().fold(f64::INFINITY, f64::min);
        let avg = costs.iter().sum::<f64>() / costs.len() as f64;
        let worst = costs.iter().cloned().fold(0.0, f64::max);
        let avg_time =
            solutions.iter().map(|s| s.computation_time).sum::<f64>() / solutions.len() as f64;

        println!(
            "{:<15} {:>10.2} {:>10.2} {:>10.2} {:>10.4}",
            name, best, avg, worst, avg_time
        );
    }

    if let Some(out_path) = output {
        let all: Vec<Solution> = results.into_iter().flat_map(|(_, s)| s).collect();
        std::fs::write(&out_path, generate_comparison_data(&all))?;
        println!("\nResults exported to {:?}", out_path);
    }

    Ok(())
}
