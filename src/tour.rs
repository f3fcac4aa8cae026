//! Tour representation and manipulation.
//!
//! A tour is a cyclic ordering of cities: the last city connects back to the
//! first. Every mutator recomputes the cached total length before returning, so
//! [`Tour::total_length`] is never stale.

use crate::city::City;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A closed tour over a fixed set of cities.
///
/// Clones are deep: each tour owns its sequence, so mutating a copy never
/// affects the original.
#[derive(Debug, Clone, Serialize)]
pub struct Tour {
    cities: Vec<City>,
    total_length: f64,
    #[serde(skip)]
    city_set: u64,
}

impl Tour {
    /// Build a tour visiting `cities` in the order given.
    pub fn new(cities: Vec<City>) -> Self {
        let city_set = city_set_fingerprint(&cities);
        let mut tour = Tour {
            cities,
            total_length: 0.0,
            city_set,
        };
        tour.recompute_length();
        tour
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn city(&self, index: usize) -> Option<&City> {
        self.cities.get(index)
    }

    /// Number of cities in the tour.
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Tours with fewer than two cities have nothing to optimize.
    pub fn is_degenerate(&self) -> bool {
        self.cities.len() < 2
    }

    /// Total closed-path length, including the edge from the last city back
    /// to the first.
    #[inline]
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Shuffle into a uniformly random permutation.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.is_degenerate() {
            return;
        }
        self.cities.shuffle(rng);
        self.recompute_length();
    }

    /// Exchange the cities at positions `i` and `j`.
    ///
    /// Out-of-range indices leave the tour untouched.
    pub fn swap(&mut self, i: usize, j: usize) {
        let n = self.cities.len();
        if i >= n || j >= n {
            return;
        }
        self.cities.swap(i, j);
        self.recompute_length();
    }

    /// Whether both tours visit the same multiset of cities, in any order.
    pub fn same_cities(&self, other: &Tour) -> bool {
        self.cities.len() == other.cities.len() && self.city_set == other.city_set
    }

    /// City labels in visiting order.
    pub fn labels(&self) -> Vec<&str> {
        self.cities.iter().map(City::label).collect()
    }

    fn recompute_length(&mut self) {
        self.total_length = path_length(&self.cities);
    }
}

/// Order-independent hash of a city multiset. Swaps and shuffles keep it.
fn city_set_fingerprint(cities: &[City]) -> u64 {
    cities.iter().fold(0u64, |acc, city| {
        let mut hasher = DefaultHasher::new();
        city.label().hash(&mut hasher);
        city.x().to_bits().hash(&mut hasher);
        city.y().to_bits().hash(&mut hasher);
        acc.wrapping_add(hasher.finish())
    })
}

/// Closed path length of `cities` taken in order.
pub fn path_length(cities: &[City]) -> f64 {
    if cities.len() < 2 {
        return 0.0;
    }

    let mut length = 0.0;
    for pair in cities.windows(2) {
        length += pair[0].distance_to(&pair[1]);
    }

    length += cities[cities.len() - 1].distance_to(&cities[0]);

    length
}

impl std::fmt::Display for Tour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tour ({} cities)", self.cities.len())?;
        writeln!(f, "  Total length: {:.2}", self.total_length)?;
        for (i, city) in self.cities.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, city.label())?;
        }
        if let Some(first) = self.cities.first() {
            writeln!(f, "  {}. {} (return to start)", self.cities.len() + 1, first.label())?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cities_strategy() -> impl Strategy<Value = Vec<City>> {
        prop::collection::vec((-1000.0f64..1000.0, -1000.0f64..1000.0), 0..20).prop_map(|coords| {
            coords
                .into_iter()
                .enumerate()
                .map(|(i, (x, y))| City::new(format!("c{}", i), x, y))
                .collect()
        })
    }

    fn sorted(labels: Vec<&str>) -> Vec<String> {
        let mut labels: Vec<String> = labels.into_iter().map(String::from).collect();
        labels.sort();
        labels
    }

    proptest! {
        /// Property: swaps and shuffles never lose or duplicate a city, and the
        /// cached length always matches a fresh recomputation.
        #[test]
        fn prop_mutators_preserve_permutation(
            cities in cities_strategy(),
            swaps in prop::collection::vec((0usize..25, 0usize..25), 0..30),
            seed in 0u64..1000,
        ) {
            let mut tour = Tour::new(cities.clone());
            let expected = sorted(cities.iter().map(City::label).collect());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            tour.randomize(&mut rng);
            prop_assert_eq!(sorted(tour.labels()), expected.clone());
            prop_assert_eq!(tour.total_length(), path_length(tour.cities()));

            for (i, j) in swaps {
                tour.swap(i, j);
                prop_assert_eq!(sorted(tour.labels()), expected.clone());
                prop_assert_eq!(tour.total_length(), path_length(tour.cities()));
            }
        }
    }
}
