//! SA-TSP Solver - Command Line Interface
//!
//! Solves Euclidean traveling salesman instances with simulated annealing.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use sa_tsp_solver::annealing::{
    AnnealingEngine, AnnealingStats, HistoryRecorder, ProgressBarSink, ProgressSink, Schedule,
};
use sa_tsp_solver::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use sa_tsp_solver::instance::{CityInstance, SAMPLE_NAMES};
use sa_tsp_solver::visualization::{SvgFrameSink, Visualizer};
use sa_tsp_solver::{City, Error, Result, Tour};
use serde::Serialize;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sa-tsp-solver")]
#[command(version = "1.0")]
#[command(about = "Simulated annealing solver for the Euclidean TSP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anneal one city set
    Solve {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        schedule: ScheduleArgs,

        /// Random seed; omit to seed from OS entropy
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output best tour and statistics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write an SVG snapshot of the working tour into this directory
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Iterations between two snapshots
        #[arg(long, default_value = "1000")]
        frame_every: u64,

        /// Generate tour and convergence drawings (PNG, falling back to SVG)
        #[arg(long)]
        visualize: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run repeated seeded annealing runs on a directory of instances
    Benchmark {
        /// Directory containing `.tsp` / `.csv` instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs per instance
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Seed of the first run
        #[arg(long, default_value = "0")]
        base_seed: u64,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Describe a city set
    Analyze {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Path to a TSPLIB (.tsp) or CSV (.csv) instance
    #[arg(short, long)]
    instance: Option<PathBuf>,

    /// Built-in sample set (malawi, grid10)
    #[arg(long)]
    sample: Option<String>,

    /// Generate this many uniform random cities in a 1000x1000 square
    #[arg(long)]
    random: Option<usize>,
}

#[derive(Args)]
struct ScheduleArgs {
    /// JSON file with `initial_temperature`, `cooling_rate`, `iterations_per_step`
    #[arg(
        long,
        conflicts_with_all = ["initial_temperature", "cooling_rate", "iterations_per_step"]
    )]
    schedule: Option<PathBuf>,

    /// Starting temperature
    #[arg(long)]
    initial_temperature: Option<f64>,

    /// Geometric cooling factor in (0, 1)
    #[arg(long)]
    cooling_rate: Option<f64>,

    /// Iterations between two cooling steps
    #[arg(long)]
    iterations_per_step: Option<u64>,

    /// Stop after this many iterations even above the temperature floor
    #[arg(long)]
    max_iterations: Option<u64>,
}

impl ScheduleArgs {
    fn resolve(&self) -> Result<Schedule> {
        let mut schedule = match &self.schedule {
            Some(path) => Schedule::from_json_file(path)?,
            None => {
                let defaults = Schedule::default();
                Schedule::new(
                    self.initial_temperature.unwrap_or(defaults.initial_temperature),
                    self.cooling_rate.unwrap_or(defaults.cooling_rate),
                    self.iterations_per_step.unwrap_or(defaults.iterations_per_step),
                )?
            }
        };
        if let Some(max) = self.max_iterations {
            schedule = schedule.with_max_iterations(max);
            schedule.validate()?;
        }
        Ok(schedule)
    }
}

impl InputArgs {
    fn load(&self, seed: u64) -> Result<CityInstance> {
        if let Some(path) = &self.instance {
            println!("Loading instance from {:?}...", path);
            return CityInstance::from_file(path);
        }
        if let Some(name) = &self.sample {
            return CityInstance::sample(name).ok_or_else(|| {
                Error::invalid_instance(format!(
                    "unknown sample '{}' (available: {})",
                    name,
                    SAMPLE_NAMES.join(", ")
                ))
            });
        }
        if let Some(count) = self.random {
            return Ok(CityInstance::random(count, 1000.0, 1000.0, seed));
        }
        Err(Error::invalid_instance("no city input given"))
    }
}

/// Written by `solve --output`.
#[derive(Serialize)]
struct SolveReport<'a> {
    instance: &'a str,
    seed: Option<u64>,
    schedule: Schedule,
    best_length: f64,
    tour: &'a [City],
    stats: AnnealingStats,
    time: f64,
    finished_at: DateTime<Utc>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Solve {
            input,
            schedule,
            seed,
            output,
            frames,
            frame_every,
            visualize,
            quiet,
        } => solve(&input, &schedule, seed, output, frames, frame_every, visualize, quiet),

        Commands::Benchmark {
            dir,
            output,
            runs,
            base_seed,
            max_size,
            schedule,
        } => run_benchmark(&dir, &output, runs, base_seed, max_size, &schedule),

        Commands::Analyze { input } => analyze(&input),
    };

    if let Err(e) = outcome {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn solve(
    input: &InputArgs,
    schedule_args: &ScheduleArgs,
    seed: Option<u64>,
    output: Option<PathBuf>,
    frames: Option<PathBuf>,
    frame_every: u64,
    visualize: bool,
    quiet: bool,
) -> Result<()> {
    let schedule = schedule_args.resolve()?;
    let instance = input.load(seed.unwrap_or(0))?;

    println!("Instance: {} ({} cities)", instance.name, instance.len());
    println!("{}", schedule);

    let mut bar = if quiet {
        ProgressBarSink::hidden()
    } else {
        ProgressBarSink::new(schedule.expected_iterations())
    };
    let mut history = HistoryRecorder::every(schedule.iterations_per_step);
    let mut frame_sink = match frames {
        Some(dir) => Some(SvgFrameSink::new(dir, frame_every)?),
        None => None,
    };

    let start = Instant::now();
    let (best, stats) = {
        let mut observer = |tour: &Tour, temperature: f64, iteration: u64| {
            bar.on_iteration(tour, temperature, iteration);
            history.on_iteration(tour, temperature, iteration);
            if let Some(sink) = frame_sink.as_mut() {
                sink.on_iteration(tour, temperature, iteration);
            }
        };
        let engine = match seed {
            Some(seed) => AnnealingEngine::new(schedule, seed)?,
            None => AnnealingEngine::from_entropy(schedule)?,
        };
        let mut engine = engine.with_progress_sink(&mut observer);
        let best = engine.run_to_completion(&instance.cities)?;
        (best, engine.stats())
    };
    let elapsed = start.elapsed().as_secs_f64();
    bar.finish();

    println!("\n========== Results ==========");
    println!("{}", best);
    println!("Best length: {:.2}", best.total_length());
    println!("Iterations: {}", stats.iterations);
    println!(
        "Accepted moves: {} ({} improving)",
        stats.accepted_moves, stats.improving_moves
    );
    println!("Final temperature: {:.4}", stats.temperature);
    println!("Time: {:.4}s", elapsed);
    if let Some(sink) = &frame_sink {
        println!("Frames written: {}", sink.frames_written());
    }

    if let Some(out_path) = output {
        let report = SolveReport {
            instance: &instance.name,
            seed,
            schedule,
            best_length: best.total_length(),
            tour: best.cities(),
            stats,
            time: elapsed,
            finished_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&out_path, json)?;
        println!("\nSolution saved to {:?}", out_path);
    }

    if visualize {
        let viz = Visualizer::new();
        let base = PathBuf::from(&instance.name);

        let svg = viz.generate_svg(&instance.name, &best);
        save_drawing(&viz, &svg, &base, "tour")?;

        let convergence = viz.generate_convergence_svg(history.points());
        save_drawing(&viz, &convergence, &base, "convergence")?;
    }

    Ok(())
}

/// Save as PNG, falling back to SVG when PNG rendering is unavailable.
fn save_drawing(viz: &Visualizer, svg: &str, base: &Path, kind: &str) -> Result<()> {
    let png_path = base.with_extension(format!("{}.png", kind));
    match viz.save_png(svg, &png_path) {
        Ok(()) => println!("Visualization saved to {:?}", png_path),
        Err(e) => {
            let svg_path = base.with_extension(format!("{}.svg", kind));
            viz.save_svg(svg, &svg_path)?;
            println!("PNG conversion failed ({}). Saved SVG to {:?}", e, svg_path);
        }
    }
    Ok(())
}

fn run_benchmark(
    dir: &Path,
    output: &Path,
    runs: usize,
    base_seed: u64,
    max_size: Option<usize>,
    schedule_args: &ScheduleArgs,
) -> Result<()> {
    println!("Loading instances from {:?}...", dir);

    let mut instances = load_instances_from_dir(dir)?;

    if let Some(max) = max_size {
        instances.retain(|i| i.len() <= max);
    }

    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    std::fs::create_dir_all(output)?;

    let config = BenchmarkConfig {
        num_runs: runs,
        base_seed,
        schedule: schedule_args.resolve()?,
    };

    let mut benchmark = Benchmark::new(config);

    for (i, instance) in instances.iter().enumerate() {
        println!(
            "\n[{}/{}] Processing {} (n={})...",
            i + 1,
            instances.len(),
            instance.name,
            instance.len()
        );

        if let Err(e) = benchmark.run_instance(instance) {
            log::warn!("Skipping {}: {}", instance.name, e);
        }
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

fn analyze(input: &InputArgs) -> Result<()> {
    let instance = input.load(0)?;

    println!("========== Instance Analysis ==========\n");
    if !instance.comment.is_empty() {
        println!("Comment: {}", instance.comment);
    }
    println!("{}", instance.statistics());

    if instance.len() >= 2 {
        let initial = Tour::new(instance.cities.clone());
        println!("\nInput-order tour length: {:.2}", initial.total_length());

        let quick = Schedule::new(100.0, 0.9, 10 * instance.len() as u64)?;
        let mut engine = AnnealingEngine::new(quick, 0)?;
        let best = engine.run_to_completion(&instance.cities)?;
        println!("Quick annealing estimate: {:.2} ({})", best.total_length(), quick);
    }

    Ok(())
}
