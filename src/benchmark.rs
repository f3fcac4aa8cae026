//! Benchmarking and experimentation module.
//!
//! Repeats independent seeded annealing runs on city sets, collects per-run
//! results and aggregates them into statistics, CSV files and a text report.

use crate::annealing::{AnnealingEngine, Schedule};
use crate::error::Result;
use crate::instance::CityInstance;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Result of a single annealing run on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Instance name
    pub instance: String,
    /// Number of cities
    pub num_cities: usize,
    /// Seed of the engine's generator
    pub seed: u64,
    /// Length of the best tour found
    pub best_length: f64,
    /// Iterations performed
    pub iterations: u64,
    /// Accepted moves (improving and uphill)
    pub accepted_moves: u64,
    /// Temperature when the run stopped
    pub final_temperature: f64,
    /// Wall-clock time in seconds
    pub time: f64,
    /// Gap to best known length in percent (if available)
    pub gap_to_best: Option<f64>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

/// Aggregated statistics for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub instance: String,
    pub num_runs: usize,
    pub avg_length: f64,
    pub best_length: f64,
    pub worst_length: f64,
    pub std_length: f64,
    pub avg_time: f64,
    pub total_time: f64,
    pub avg_iterations: f64,
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of independent runs per instance
    pub num_runs: usize,
    /// Seed of the first run; run `k` uses `base_seed + k`
    pub base_seed: u64,
    /// Schedule shared by all runs
    pub schedule: Schedule,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            base_seed: 0,
            schedule: Schedule::default(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
    best_known: BTreeMap<String, f64>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best_known: BTreeMap::new(),
        }
    }

    /// Set best known tour length for an instance
    pub fn set_best_known(&mut self, instance_name: &str, length: f64) {
        self.best_known.insert(instance_name.to_string(), length);
    }

    /// Run every configured seed on an instance
    pub fn run_instance(&mut self, instance: &CityInstance) -> Result<()> {
        log::info!(
            "Running {} annealing runs on instance: {} (n={})",
            self.config.num_runs,
            instance.name,
            instance.len()
        );

        for run in 0..self.config.num_runs {
            let seed = self.config.base_seed.wrapping_add(run as u64);
            let mut engine = AnnealingEngine::new(self.config.schedule, seed)?;

            let start = Instant::now();
            let best = engine.run_to_completion(&instance.cities)?;
            let elapsed = start.elapsed().as_secs_f64();

            let stats = engine.stats();
            let gap_to_best = self
                .best_known
                .get(&instance.name)
                .map(|&known| (best.total_length() - known) / known * 100.0);

            self.results.push(RunResult {
                instance: instance.name.clone(),
                num_cities: instance.len(),
                seed,
                best_length: best.total_length(),
                iterations: stats.iterations,
                accepted_moves: stats.accepted_moves,
                final_temperature: stats.temperature,
                time: elapsed,
                gap_to_best,
                finished_at: Utc::now(),
            });
        }

        Ok(())
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[CityInstance]) -> Result<()> {
        for instance in instances {
            self.run_instance(instance)?;
        }
        Ok(())
    }

    /// Compute statistics for each instance
    pub fn compute_statistics(&self) -> Vec<RunStatistics> {
        let mut by_instance: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            by_instance.entry(result.instance.as_str()).or_default().push(result);
        }

        by_instance
            .into_iter()
            .map(|(instance, runs)| {
                let lengths: Vec<f64> = runs.iter().map(|r| r.best_length).collect();
                let times: Vec<f64> = runs.iter().map(|r| r.time).collect();
                let iterations: Vec<f64> = runs.iter().map(|r| r.iterations as f64).collect();
                let gaps: Vec<f64> = runs.iter().filter_map(|r| r.gap_to_best).collect();

                let std_length = if lengths.len() > 1 {
                    lengths.iter().std_dev()
                } else {
                    0.0
                };

                RunStatistics {
                    instance: instance.to_string(),
                    num_runs: runs.len(),
                    avg_length: lengths.iter().mean(),
                    best_length: lengths.iter().cloned().fold(f64::INFINITY, f64::min),
                    worst_length: lengths.iter().cloned().fold(0.0, f64::max),
                    std_length,
                    avg_time: times.iter().mean(),
                    total_time: times.iter().sum(),
                    avg_iterations: iterations.iter().mean(),
                    avg_gap: if gaps.is_empty() {
                        None
                    } else {
                        Some(gaps.iter().mean())
                    },
                }
            })
            .collect()
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
        report.push_str("    Simulated Annealing Benchmark\n");
        report.push_str("========================================\n\n");
        report.push_str(&format!("{}\n\n", self.config.schedule));

        report.push_str("-".repeat(86).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>6} {:>12} {:>12} {:>12} {:>10} {:>10}\n",
            "Instance", "Runs", "Avg Length", "Best", "Std Dev", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(86).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());

            report.push_str(&format!(
                "{:<20} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>10} {:>10.4}\n",
                stat.instance,
                stat.num_runs,
                stat.avg_length,
                stat.best_length,
                stat.std_length,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(86).as_str());
        report.push('\n');

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}

/// Helper function to load every `.tsp` and `.csv` instance in a directory.
/// Files that fail to parse are logged and skipped.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<CityInstance>> {
    let mut instances = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let supported = path
            .extension()
            .map(|e| e == "tsp" || e == "csv")
            .unwrap_or(false);
        if !supported {
            continue;
        }
        match CityInstance::from_file(&path) {
            Ok(instance) => instances.push(instance),
            Err(e) => log::warn!("Skipping {:?}: {}", path, e),
        }
    }

    instances.sort_by_key(|i| i.len());

    Ok(instances)
}
