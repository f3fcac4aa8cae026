//! SA-TSP Solver Library
//!
//! Simulated annealing for the Euclidean Traveling Salesman Problem.
//!
//! # Features
//!
//! - Stepwise annealing engine (`run_one_iteration` / `cool_temperature`) for
//!   hosts that interleave the search with their own work
//! - Batch driver (`run_to_completion`) with best-tour tracking
//! - Progress observers: log lines, progress bar, convergence history, SVG frames
//! - TSPLIB / CSV loading, built-in sample sets, seeded random instances
//! - Benchmarking and visualization tools
//!
//! # Example
//!
//! ```no_run
//! use sa_tsp_solver::annealing::{AnnealingEngine, Schedule};
//! use sa_tsp_solver::instance::CityInstance;
//!
//! let instance = CityInstance::sample("malawi").unwrap();
//!
//! let mut engine = AnnealingEngine::new(Schedule::default(), 42).unwrap();
//! let best = engine.run_to_completion(&instance.cities).unwrap();
//!
//! println!("Best length: {:.2}", best.total_length());
//! ```

pub mod annealing;
pub mod benchmark;
pub mod city;
pub mod error;
pub mod instance;
pub mod tour;
pub mod visualization;

pub use annealing::{AnnealingEngine, Schedule};
pub use city::City;
pub use error::{Error, Result};
pub use instance::CityInstance;
pub use tour::Tour;
