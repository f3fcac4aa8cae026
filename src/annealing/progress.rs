//! Observers notified after every annealing iteration.
//!
//! Sinks are purely observational: they receive a shared view of the working
//! tour and cannot influence the search.

use crate::tour::Tour;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

/// Receives `(current tour, temperature, iteration count)` after each
/// iteration. Called synchronously on the search loop, so implementations
/// should return quickly.
pub trait ProgressSink {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64);
}

impl<F> ProgressSink for F
where
    F: FnMut(&Tour, f64, u64),
{
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        self(tour, temperature, iteration)
    }
}

/// Forwards every notification to two sinks in order.
pub struct Fanout<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Fanout<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Fanout { first, second }
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for Fanout<A, B> {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        self.first.on_iteration(tour, temperature, iteration);
        self.second.on_iteration(tour, temperature, iteration);
    }
}

/// Writes a progress line to the log every `every` iterations.
pub struct LogProgress {
    pub every: u64,
}

impl LogProgress {
    pub fn every(every: u64) -> Self {
        LogProgress { every: every.max(1) }
    }
}

impl ProgressSink for LogProgress {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        if iteration % self.every == 0 {
            log::info!(
                "iteration {}: temperature {:.4}, current length {:.2}",
                iteration,
                temperature,
                tour.total_length()
            );
        }
    }
}

/// Terminal progress bar sized from the schedule's expected iteration count.
pub struct ProgressBarSink {
    bar: ProgressBar,
    refresh_every: u64,
}

impl ProgressBarSink {
    pub fn new(expected_iterations: u64) -> Self {
        let bar = ProgressBar::new(expected_iterations);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        ProgressBarSink {
            bar,
            refresh_every: 100,
        }
    }

    /// Sink that tracks progress without drawing anything.
    pub fn hidden() -> Self {
        ProgressBarSink {
            bar: ProgressBar::hidden(),
            refresh_every: 100,
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

impl ProgressSink for ProgressBarSink {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        self.bar.set_position(iteration);
        if iteration % self.refresh_every == 0 {
            self.bar
                .set_message(format!("T={:.2} len={:.2}", temperature, tour.total_length()));
        }
    }
}

/// One sample of a run's trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub iteration: u64,
    pub temperature: f64,
    pub length: f64,
}

/// Samples the working tour's length every `every` iterations.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    every: u64,
    points: Vec<HistoryPoint>,
}

impl HistoryRecorder {
    pub fn every(every: u64) -> Self {
        HistoryRecorder {
            every: every.max(1),
            points: Vec::new(),
        }
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<HistoryPoint> {
        self.points
    }
}

impl ProgressSink for HistoryRecorder {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        if iteration % self.every == 0 {
            self.points.push(HistoryPoint {
                iteration,
                temperature,
                length: tour.total_length(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::City;

    fn line_tour() -> Tour {
        Tour::new(vec![City::new("a", 0.0, 0.0), City::new("b", 3.0, 0.0)])
    }

    #[test]
    fn test_closure_sink() {
        let tour = line_tour();
        let mut seen = Vec::new();
        {
            let mut sink = |t: &Tour, temp: f64, it: u64| seen.push((t.total_length(), temp, it));
            sink.on_iteration(&tour, 5.0, 1);
            sink.on_iteration(&tour, 4.0, 2);
        }
        assert_eq!(seen, vec![(6.0, 5.0, 1), (6.0, 4.0, 2)]);
    }

    #[test]
    fn test_history_sampling() {
        let tour = line_tour();
        let mut recorder = HistoryRecorder::every(3);
        for it in 1..=10 {
            recorder.on_iteration(&tour, 100.0 / it as f64, it);
        }
        let iterations: Vec<u64> = recorder.points().iter().map(|p| p.iteration).collect();
        assert_eq!(iterations, vec![3, 6, 9]);
        assert!(recorder.points().iter().all(|p| p.length == 6.0));
    }

    #[test]
    fn test_fanout_and_progress_bar() {
        let tour = line_tour();
        let mut sink = Fanout::new(ProgressBarSink::hidden(), HistoryRecorder::every(1));
        sink.on_iteration(&tour, 1.0, 1);
        sink.on_iteration(&tour, 1.0, 2);
        assert_eq!(sink.first.position(), 2);
        assert_eq!(sink.second.points().len(), 2);
    }
}
