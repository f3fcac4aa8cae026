//! Stepwise simulated annealing engine.
//!
//! The engine exposes the search as two primitives, [`AnnealingEngine::run_one_iteration`]
//! and [`AnnealingEngine::cool_temperature`], so a host loop can interleave
//! optimization with its own work (redrawing, polling, time checks).
//! [`AnnealingEngine::run_to_completion`] is the batch driver built on them.

use super::progress::ProgressSink;
use super::schedule::{Schedule, TEMPERATURE_FLOOR};
use crate::city::City;
use crate::error::{Error, Result};
use crate::tour::Tour;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Result of a single call to [`AnnealingEngine::run_one_iteration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The candidate was accepted and copied into the working tour.
    Accepted,
    /// The candidate was rejected; the working tour is unchanged.
    Rejected,
    /// No iteration ran: the engine is terminal or the tour has fewer than
    /// two cities.
    Halted,
}

impl IterationOutcome {
    pub fn moved(self) -> bool {
        self == IterationOutcome::Accepted
    }
}

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Active,
    Terminal,
}

/// Snapshot of run statistics, readable at any point of a run.
#[derive(Debug, Clone, Serialize)]
pub struct AnnealingStats {
    pub iterations: u64,
    pub temperature: f64,
    pub accepted_moves: u64,
    pub improving_moves: u64,
    pub best_length: Option<f64>,
}

/// Metropolis acceptance probability for a move changing the tour length by
/// `delta` at `temperature`.
///
/// Improving moves are always accepted; worsening moves are accepted with
/// probability `exp(-delta / temperature)`.
#[inline]
pub fn acceptance_probability(delta: f64, temperature: f64) -> f64 {
    if delta < 0.0 {
        1.0
    } else {
        (-delta / temperature).exp()
    }
}

/// Simulated annealing over a caller-owned working tour.
///
/// The engine owns its random generator, seeded once at construction, and an
/// independent copy of the best tour seen since the last reset.
pub struct AnnealingEngine<'a> {
    schedule: Schedule,
    current_temperature: f64,
    iteration_count: u64,
    accepted_moves: u64,
    improving_moves: u64,
    last_cooled_at: u64,
    best: Option<Tour>,
    rng: ChaCha8Rng,
    sink: Option<&'a mut dyn ProgressSink>,
}

impl<'a> AnnealingEngine<'a> {
    /// Engine with a deterministic generator seeded from `seed`.
    pub fn new(schedule: Schedule, seed: u64) -> Result<Self> {
        Self::with_rng(schedule, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Engine seeded once from operating system entropy.
    pub fn from_entropy(schedule: Schedule) -> Result<Self> {
        Self::with_rng(schedule, ChaCha8Rng::from_entropy())
    }

    fn with_rng(schedule: Schedule, rng: ChaCha8Rng) -> Result<Self> {
        schedule.validate()?;
        Ok(AnnealingEngine {
            schedule,
            current_temperature: schedule.initial_temperature,
            iteration_count: 0,
            accepted_moves: 0,
            improving_moves: 0,
            last_cooled_at: 0,
            best: None,
            rng,
            sink: None,
        })
    }

    /// Attach an observer notified after every iteration.
    pub fn with_progress_sink(mut self, sink: &'a mut dyn ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_progress_sink(&mut self, sink: Option<&'a mut dyn ProgressSink>) {
        self.sink = sink;
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn current_temperature(&self) -> f64 {
        self.current_temperature
    }

    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    /// Best tour seen since the last reset, if any iteration has run.
    pub fn best_tour(&self) -> Option<&Tour> {
        self.best.as_ref()
    }

    pub fn best_length(&self) -> Option<f64> {
        self.best.as_ref().map(Tour::total_length)
    }

    /// Terminal once the temperature reaches the floor or the iteration cap
    /// is used up.
    pub fn is_terminal(&self) -> bool {
        self.current_temperature <= TEMPERATURE_FLOOR
            || self
                .schedule
                .max_iterations
                .map_or(false, |max| self.iteration_count >= max)
    }

    pub fn phase(&self) -> Phase {
        if self.is_terminal() {
            Phase::Terminal
        } else if self.iteration_count == 0 {
            Phase::Idle
        } else {
            Phase::Active
        }
    }

    pub fn stats(&self) -> AnnealingStats {
        AnnealingStats {
            iterations: self.iteration_count,
            temperature: self.current_temperature,
            accepted_moves: self.accepted_moves,
            improving_moves: self.improving_moves,
            best_length: self.best_length(),
        }
    }

    /// Replace the schedule and return to the idle state. The generator is
    /// not reseeded and no caller-owned tour is touched.
    pub fn reset(&mut self, schedule: Schedule) -> Result<()> {
        schedule.validate()?;
        self.schedule = schedule;
        self.restart();
        Ok(())
    }

    /// Return to the idle state with the current schedule.
    pub fn restart(&mut self) {
        self.current_temperature = self.schedule.initial_temperature;
        self.iteration_count = 0;
        self.accepted_moves = 0;
        self.improving_moves = 0;
        self.last_cooled_at = 0;
        self.best = None;
    }

    /// Propose one pairwise swap of `tour` and accept or reject it with the
    /// Metropolis criterion. An accepted candidate replaces `tour` in place.
    pub fn run_one_iteration(&mut self, tour: &mut Tour) -> IterationOutcome {
        if self.is_terminal() || tour.is_degenerate() {
            return IterationOutcome::Halted;
        }

        let stale = match &self.best {
            Some(best) => !best.same_cities(tour),
            None => true,
        };
        if stale {
            self.best = Some(tour.clone());
        }

        let n = tour.len();
        let i = self.rng.gen_range(0..n);
        let mut j = self.rng.gen_range(0..n);
        while j == i {
            j = self.rng.gen_range(0..n);
        }

        let mut candidate = tour.clone();
        candidate.swap(i, j);

        let delta = candidate.total_length() - tour.total_length();
        let probability = acceptance_probability(delta, self.current_temperature);

        let outcome = if self.rng.gen::<f64>() < probability {
            *tour = candidate;
            self.accepted_moves += 1;
            if delta < 0.0 {
                self.improving_moves += 1;
            }
            self.update_best(tour);
            IterationOutcome::Accepted
        } else {
            IterationOutcome::Rejected
        };

        self.iteration_count += 1;

        if let Some(sink) = self.sink.as_mut() {
            sink.on_iteration(tour, self.current_temperature, self.iteration_count);
        }

        outcome
    }

    /// Multiply the temperature by the cooling rate when the iteration count
    /// sits on the schedule's cadence. Any other call is a no-op, including a
    /// second call at the same iteration count.
    pub fn cool_temperature(&mut self) -> bool {
        let count = self.iteration_count;
        if count == 0
            || count % self.schedule.iterations_per_step != 0
            || count == self.last_cooled_at
        {
            return false;
        }
        self.current_temperature *= self.schedule.cooling_rate;
        self.last_cooled_at = count;
        true
    }

    /// Anneal a random permutation of `cities` until the temperature reaches
    /// the floor and return the best tour observed.
    ///
    /// Restarts the schedule first; statistics stay readable afterwards.
    pub fn run_to_completion(&mut self, cities: &[City]) -> Result<Tour> {
        if cities.len() < 2 {
            return Err(Error::TooFewCities(cities.len()));
        }

        self.restart();

        let mut working = Tour::new(cities.to_vec());
        working.randomize(&mut self.rng);
        self.best = Some(working.clone());

        log::info!(
            "Annealing {} cities (T0={}, rate={}, {} iterations/step), initial length {:.2}",
            cities.len(),
            self.schedule.initial_temperature,
            self.schedule.cooling_rate,
            self.schedule.iterations_per_step,
            working.total_length()
        );

        while !self.is_terminal() {
            self.run_one_iteration(&mut working);
            self.cool_temperature();
        }

        let best = self.best.clone().unwrap_or(working);

        log::info!(
            "Annealing complete: {} iterations, best length {:.2}, final temperature {:.4}",
            self.iteration_count,
            best.total_length(),
            self.current_temperature
        );

        Ok(best)
    }

    fn update_best(&mut self, tour: &Tour) {
        let improved = match &self.best {
            Some(best) => tour.total_length() < best.total_length(),
            None => true,
        };
        if improved {
            log::debug!(
                "New best length {:.2} (iteration {}, temperature {:.4})",
                tour.total_length(),
                self.iteration_count + 1,
                self.current_temperature
            );
            self.best = Some(tour.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annealing::progress::HistoryRecorder;

    fn unit_square() -> Vec<City> {
        vec![
            City::new("a", 0.0, 0.0),
            City::new("b", 0.0, 1.0),
            City::new("c", 1.0, 1.0),
            City::new("d", 1.0, 0.0),
        ]
    }

    fn scattered(n: usize) -> Vec<City> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                City::new(format!("c{}", i), (t * 37.0) % 101.0, (t * 61.0) % 89.0)
            })
            .collect()
    }

    #[test]
    fn test_acceptance_probability() {
        assert_eq!(acceptance_probability(-3.0, 10.0), 1.0);
        assert_eq!(acceptance_probability(0.0, 10.0), 1.0);

        let p = acceptance_probability(1.0, 10.0);
        assert!(p > 0.0 && p < 1.0);
        assert!(acceptance_probability(2.0, 10.0) < p);
        assert!(acceptance_probability(1.0, 5.0) < p);
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = AnnealingEngine::new(Schedule::default(), 1).unwrap();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.iteration_count(), 0);
        assert_eq!(engine.current_temperature(), 10_000.0);
        assert!(engine.best_tour().is_none());
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let bad = Schedule {
            cooling_rate: 1.5,
            ..Schedule::default()
        };
        assert!(matches!(AnnealingEngine::new(bad, 1), Err(Error::InvalidSchedule(_))));

        let mut engine = AnnealingEngine::new(Schedule::default(), 1).unwrap();
        assert!(engine.reset(bad).is_err());
        assert_eq!(engine.schedule(), &Schedule::default());
    }

    #[test]
    fn test_iteration_counts_every_call() {
        let mut engine = AnnealingEngine::new(Schedule::default(), 3).unwrap();
        let mut tour = Tour::new(scattered(8));
        for k in 1..=50 {
            let outcome = engine.run_one_iteration(&mut tour);
            assert_ne!(outcome, IterationOutcome::Halted);
            assert_eq!(engine.iteration_count(), k);
        }
        assert_eq!(engine.phase(), Phase::Active);
        let stats = engine.stats();
        assert!(stats.accepted_moves >= stats.improving_moves);
        assert!(stats.accepted_moves <= 50);
    }

    #[test]
    fn test_rejected_move_leaves_tour_unchanged() {
        let schedule = Schedule::new(0.2, 0.5, 1000).unwrap();
        let mut engine = AnnealingEngine::new(schedule, 11).unwrap();
        let mut tour = Tour::new(unit_square());
        for _ in 0..200 {
            let before = tour.clone();
            match engine.run_one_iteration(&mut tour) {
                IterationOutcome::Rejected => {
                    assert_eq!(tour.labels(), before.labels());
                    assert_eq!(tour.total_length(), before.total_length());
                }
                IterationOutcome::Accepted => {
                    assert_ne!(tour.labels(), before.labels());
                }
                IterationOutcome::Halted => panic!("engine should not halt"),
            }
        }
    }

    #[test]
    fn test_degenerate_tour_halts_without_counting() {
        let mut engine = AnnealingEngine::new(Schedule::default(), 5).unwrap();

        let mut empty = Tour::new(Vec::new());
        assert_eq!(engine.run_one_iteration(&mut empty), IterationOutcome::Halted);

        let mut single = Tour::new(vec![City::new("only", 1.0, 2.0)]);
        assert_eq!(engine.run_one_iteration(&mut single), IterationOutcome::Halted);
        assert!(!IterationOutcome::Halted.moved());

        assert_eq!(engine.iteration_count(), 0);
        assert!(engine.best_tour().is_none());
    }

    #[test]
    fn test_best_reseeded_when_city_set_changes() {
        let mut engine = AnnealingEngine::new(Schedule::new(1000.0, 0.9, 50).unwrap(), 8).unwrap();

        let cities = unit_square();
        let mut pair = Tour::new(cities[..2].to_vec());
        engine.run_one_iteration(&mut pair);
        assert_eq!(engine.best_tour().map(Tour::len), Some(2));

        let mut full = Tour::new(cities);
        for _ in 0..500 {
            engine.run_one_iteration(&mut full);
            engine.cool_temperature();
        }

        let best = engine.best_tour().unwrap();
        assert_eq!(best.len(), 4);
        assert!(best.same_cities(&full));
        assert!(best.total_length() <= full.total_length() + 1e-9);
    }

    #[test]
    fn test_max_iterations_stops_both_modes() {
        let schedule = Schedule::new(1e6, 0.999, 100).unwrap().with_max_iterations(250);

        let mut stepwise = AnnealingEngine::new(schedule, 4).unwrap();
        let mut tour = Tour::new(unit_square());
        let mut steps = 0;
        while stepwise.run_one_iteration(&mut tour) != IterationOutcome::Halted {
            stepwise.cool_temperature();
            steps += 1;
        }
        assert_eq!(steps, 250);
        assert_eq!(stepwise.iteration_count(), 250);
        assert_eq!(stepwise.phase(), Phase::Terminal);
        assert!(stepwise.current_temperature() > TEMPERATURE_FLOOR);

        let mut batch = AnnealingEngine::new(schedule, 4).unwrap();
        let best = batch.run_to_completion(&unit_square()).unwrap();
        assert_eq!(batch.iteration_count(), 250);
        assert_eq!(best.len(), 4);
    }

    #[test]
    fn test_run_to_completion_rejects_too_few_cities() {
        let mut engine = AnnealingEngine::new(Schedule::default(), 5).unwrap();
        assert!(matches!(engine.run_to_completion(&[]), Err(Error::TooFewCities(0))));
        let one = [City::new("only", 0.0, 0.0)];
        assert!(matches!(engine.run_to_completion(&one), Err(Error::TooFewCities(1))));
    }

    #[test]
    fn test_cooling_cadence() {
        let schedule = Schedule::new(1000.0, 0.5, 4).unwrap();
        let mut engine = AnnealingEngine::new(schedule, 9).unwrap();
        let mut tour = Tour::new(scattered(6));

        assert!(!engine.cool_temperature());
        assert_eq!(engine.current_temperature(), 1000.0);

        let mut expected = 1000.0;
        for k in 1..=20u64 {
            engine.run_one_iteration(&mut tour);
            let cooled = engine.cool_temperature();
            assert_eq!(cooled, k % 4 == 0);
            if cooled {
                expected *= 0.5;
            }
            assert_eq!(engine.current_temperature(), expected);

            // A repeat call at the same count never cools twice.
            assert!(!engine.cool_temperature());
            assert_eq!(engine.current_temperature(), expected);
        }
    }

    #[test]
    fn test_terminal_engine_halts() {
        let schedule = Schedule::new(0.4, 0.5, 1).unwrap();
        let mut engine = AnnealingEngine::new(schedule, 2).unwrap();
        let mut tour = Tour::new(unit_square());

        let mut steps = 0;
        while engine.run_one_iteration(&mut tour) != IterationOutcome::Halted {
            engine.cool_temperature();
            steps += 1;
        }
        // 0.4 -> 0.2 -> 0.1
        assert_eq!(steps, 2);
        assert_eq!(engine.phase(), Phase::Terminal);
        assert_eq!(engine.iteration_count(), 2);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut engine = AnnealingEngine::new(Schedule::new(50.0, 0.5, 1).unwrap(), 4).unwrap();
        let mut tour = Tour::new(scattered(5));
        for _ in 0..10 {
            engine.run_one_iteration(&mut tour);
            engine.cool_temperature();
        }
        let labels = tour.labels().iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let schedule = Schedule::new(200.0, 0.9, 7).unwrap();
        engine.reset(schedule).unwrap();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.iteration_count(), 0);
        assert_eq!(engine.current_temperature(), 200.0);
        assert_eq!(engine.schedule(), &schedule);
        assert!(engine.best_tour().is_none());
        assert_eq!(tour.labels(), labels);
    }

    #[test]
    fn test_unit_square_finds_optimum() {
        let schedule = Schedule::new(1000.0, 0.99, 50).unwrap();
        let mut engine = AnnealingEngine::new(schedule, 42).unwrap();
        let best = engine.run_to_completion(&unit_square()).unwrap();

        assert!((best.total_length() - 4.0).abs() < 1e-9);
        assert!(best.total_length() >= 4.0 - 1e-9);
        assert_eq!(best.len(), 4);
        assert!(engine.is_terminal());
        assert!(engine.current_temperature() <= TEMPERATURE_FLOOR);
    }

    #[test]
    fn test_coincident_cities() {
        let cities = vec![City::new("p", 3.0, 3.0), City::new("q", 3.0, 3.0)];
        let mut engine = AnnealingEngine::new(Schedule::new(10.0, 0.5, 5).unwrap(), 8).unwrap();
        let mut tour = Tour::new(cities.clone());
        for _ in 0..20 {
            // delta is always 0, so every candidate is accepted
            assert_eq!(engine.run_one_iteration(&mut tour), IterationOutcome::Accepted);
            assert_eq!(tour.total_length(), 0.0);
        }

        let best = engine.run_to_completion(&cities).unwrap();
        assert_eq!(best.total_length(), 0.0);
    }

    #[test]
    fn test_best_length_never_increases() {
        let schedule = Schedule::new(500.0, 0.95, 20).unwrap();
        let mut engine = AnnealingEngine::new(schedule, 17).unwrap();
        let mut tour = Tour::new(scattered(12));
        let mut last = f64::INFINITY;

        while engine.run_one_iteration(&mut tour) != IterationOutcome::Halted {
            engine.cool_temperature();
            let best = engine.best_length().unwrap();
            assert!(best <= last);
            assert!(best <= tour.total_length());
            last = best;
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let schedule = Schedule::new(300.0, 0.9, 10).unwrap();
        let cities = scattered(10);

        let mut first = AnnealingEngine::new(schedule, 99).unwrap();
        let mut second = AnnealingEngine::new(schedule, 99).unwrap();
        let a = first.run_to_completion(&cities).unwrap();
        let b = second.run_to_completion(&cities).unwrap();

        assert_eq!(a.labels(), b.labels());
        assert_eq!(first.iteration_count(), second.iteration_count());
    }

    #[test]
    fn test_progress_sink_sees_every_iteration() {
        let schedule = Schedule::new(100.0, 0.8, 10).unwrap();
        let mut recorder = HistoryRecorder::every(1);
        let iterations = {
            let mut engine = AnnealingEngine::new(schedule, 6)
                .unwrap()
                .with_progress_sink(&mut recorder);
            engine.run_to_completion(&scattered(6)).unwrap();
            engine.iteration_count()
        };

        let points = recorder.points();
        assert_eq!(points.len() as u64, iterations);
        for (k, point) in points.iter().enumerate() {
            assert_eq!(point.iteration, k as u64 + 1);
        }
        assert!(points.windows(2).all(|w| w[1].temperature <= w[0].temperature));
    }
}
