//! Simulated annealing for the Euclidean TSP.
//!
//! This module exports the cooling schedule, the stepwise engine and the
//! progress observers it notifies.

pub mod engine;
pub mod progress;
pub mod schedule;

pub use engine::*;
pub use progress::*;
pub use schedule::*;
