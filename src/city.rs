//! Labeled points in the plane.

use serde::{Deserialize, Serialize};

/// A city to visit. The label is for display only and plays no part in
/// distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    label: String,
    x: f64,
    y: f64,
}

impl City {
    pub fn new(label: impl Into<String>, x: f64, y: f64) -> Self {
        City { label: label.into(), x, y }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance_to(&self, other: &City) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2}, {:.2})", self.label, self.x, self.y)
    }
}
