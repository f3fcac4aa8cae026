//! Temperature schedule configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Temperature at or below which an engine stops making moves.
pub const TEMPERATURE_FLOOR: f64 = 0.1;

/// Geometric cooling schedule: the temperature is multiplied by
/// `cooling_rate` once every `iterations_per_step` iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Starting temperature. Higher values accept more uphill moves early on.
    pub initial_temperature: f64,
    /// Multiplicative decay factor, strictly between 0 and 1.
    pub cooling_rate: f64,
    /// Iterations (accepted or rejected) between two cooling steps.
    pub iterations_per_step: u64,
    /// Hard cap on iterations per run. `None` runs until the floor.
    pub max_iterations: Option<u64>,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            initial_temperature: 10_000.0,
            cooling_rate: 0.995,
            iterations_per_step: 100,
            max_iterations: None,
        }
    }
}

impl Schedule {
    /// Build a schedule, rejecting parameters that could stall or poison a run.
    pub fn new(
        initial_temperature: f64,
        cooling_rate: f64,
        iterations_per_step: u64,
    ) -> Result<Self> {
        let schedule = Schedule {
            initial_temperature,
            cooling_rate,
            iterations_per_step,
            max_iterations: None,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Stop runs after `max_iterations` iterations even if the temperature
    /// is still above the floor.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_temperature.is_finite() || self.initial_temperature <= 0.0 {
            return Err(Error::invalid_schedule(format!(
                "initial temperature must be a positive number, got {}",
                self.initial_temperature
            )));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(Error::invalid_schedule(format!(
                "cooling rate must be in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        if self.iterations_per_step == 0 {
            return Err(Error::invalid_schedule("iterations per step must be at least 1"));
        }
        if self.max_iterations == Some(0) {
            return Err(Error::invalid_schedule("max iterations must be at least 1"));
        }
        Ok(())
    }

    /// Load and validate a schedule from a JSON file. Missing fields take
    /// their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let schedule: Schedule = serde_json::from_reader(reader)?;
        schedule.validate()?;
        Ok(schedule)
    }

    /// Number of cooling steps needed to go from the initial temperature to
    /// the floor.
    pub fn cooling_steps(&self) -> u64 {
        if self.initial_temperature <= TEMPERATURE_FLOOR {
            return 0;
        }
        let ratio = (TEMPERATURE_FLOOR / self.initial_temperature).ln() / self.cooling_rate.ln();
        ratio.ceil() as u64
    }

    /// Approximate number of iterations a full run performs.
    pub fn expected_iterations(&self) -> u64 {
        let uncapped = self.cooling_steps().saturating_mul(self.iterations_per_step);
        match self.max_iterations {
            Some(max) => uncapped.min(max),
            None => uncapped,
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Annealing schedule")?;
        writeln!(f, "  Initial temperature: {}", self.initial_temperature)?;
        writeln!(f, "  Cooling rate: {}", self.cooling_rate)?;
        writeln!(f, "  Iterations per temperature: {}", self.iterations_per_step)?;
        if let Some(max) = self.max_iterations {
            writeln!(f, "  Max iterations: {}", max)?;
        }
        write!(f, "  Temperature floor: {}", TEMPERATURE_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_valid() {
        let schedule = Schedule::default();
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.iterations_per_step, 100);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Schedule::new(0.0, 0.9, 10).is_err());
        assert!(Schedule::new(-5.0, 0.9, 10).is_err());
        assert!(Schedule::new(f64::NAN, 0.9, 10).is_err());
        assert!(Schedule::new(f64::INFINITY, 0.9, 10).is_err());
        assert!(Schedule::new(100.0, 0.0, 10).is_err());
        assert!(Schedule::new(100.0, 1.0, 10).is_err());
        assert!(Schedule::new(100.0, f64::NAN, 10).is_err());
        assert!(Schedule::new(100.0, 0.9, 0).is_err());
        assert!(Schedule::new(100.0, 0.9, 1).is_ok());
    }

    #[test]
    fn test_cooling_steps() {
        let schedule = Schedule::new(1000.0, 0.5, 10).unwrap();
        // 1000 * 0.5^13 > 0.1 >= 1000 * 0.5^14
        assert_eq!(schedule.cooling_steps(), 14);
        assert_eq!(schedule.expected_iterations(), 140);

        let cold = Schedule::new(0.05, 0.5, 10).unwrap();
        assert_eq!(cold.cooling_steps(), 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let schedule: Schedule = serde_json::from_str(r#"{ "cooling_rate": 0.9 }"#).unwrap();
        assert_eq!(schedule.cooling_rate, 0.9);
        assert_eq!(schedule.initial_temperature, 10_000.0);
        assert_eq!(schedule.iterations_per_step, 100);
        assert_eq!(schedule.max_iterations, None);

        let capped: Schedule = serde_json::from_str(r#"{ "max_iterations": 500 }"#).unwrap();
        assert_eq!(capped.max_iterations, Some(500));
    }

    #[test]
    fn test_max_iterations() {
        let schedule = Schedule::new(1000.0, 0.5, 10).unwrap().with_max_iterations(25);
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.expected_iterations(), 25);
        assert!(schedule.to_string().contains("Max iterations: 25"));

        let zero = Schedule::default().with_max_iterations(0);
        assert!(matches!(zero.validate(), Err(Error::InvalidSchedule(_))));
    }
}
