//! Module for loading and describing city sets.
//!
//! Cities can come from TSPLIB files (`NODE_COORD_SECTION`, Euclidean 2D), from
//! CSV files with a `label,x,y` header, from the built-in sample sets, or from a
//! seeded random generator.

use crate::city::City;
use crate::error::{Error, Result};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Names accepted by [`CityInstance::sample`].
pub const SAMPLE_NAMES: &[&str] = &["malawi", "grid10"];

/// A named set of cities to tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityInstance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Cities in input order
    pub cities: Vec<City>,
}

impl CityInstance {
    pub fn new(name: impl Into<String>, cities: Vec<City>) -> Self {
        CityInstance {
            name: name.into(),
            comment: String::new(),
            cities,
        }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Load an instance, choosing the format from the file extension:
    /// `.csv` is read as CSV, anything else as TSPLIB.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let mut instance = if is_csv {
            Self::from_csv_reader(file)?
        } else {
            Self::from_tsplib_reader(BufReader::new(file))?
        };

        if instance.name.is_empty() {
            instance.name = stem;
        }
        Ok(instance)
    }

    /// Parse TSPLIB text. Only the header fields and `NODE_COORD_SECTION` are
    /// used; node ids become city labels.
    pub fn from_tsplib_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension: Option<usize> = None;
        let mut cities = Vec::new();
        let mut in_coords = false;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if line.starts_with("NODE_COORD_SECTION") {
                in_coords = true;
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "NAME" => name = value.to_string(),
                    "COMMENT" => comment = value.to_string(),
                    "DIMENSION" => {
                        dimension = Some(value.parse().map_err(|_| {
                            Error::invalid_instance(format!("invalid dimension '{}'", value))
                        })?);
                    }
                    "EDGE_WEIGHT_TYPE" => {
                        if value != "EUC_2D" {
                            log::warn!("edge weight type {} treated as Euclidean 2D", value);
                        }
                    }
                    _ => {}
                }
                in_coords = false;
                continue;
            }

            if line.ends_with("_SECTION") {
                in_coords = false;
                continue;
            }

            if in_coords {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 3 {
                    log::warn!("skipping malformed coordinate line {}: '{}'", line_no + 1, line);
                    continue;
                }
                let x: f64 = parts[1].parse().map_err(|_| {
                    Error::invalid_instance(format!("invalid x coordinate on line {}", line_no + 1))
                })?;
                let y: f64 = parts[2].parse().map_err(|_| {
                    Error::invalid_instance(format!("invalid y coordinate on line {}", line_no + 1))
                })?;
                cities.push(City::new(parts[0], x, y));
            }
        }

        if let Some(expected) = dimension {
            if expected != cities.len() {
                log::warn!(
                    "DIMENSION is {} but {} coordinates were read",
                    expected,
                    cities.len()
                );
            }
        }

        Ok(CityInstance {
            name,
            comment,
            cities,
        })
    }

    /// Parse CSV with a `label,x,y` header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut cities = Vec::new();
        for record in csv_reader.deserialize() {
            let city: City = record?;
            cities.push(city);
        }
        Ok(CityInstance::new(String::new(), cities))
    }

    /// Built-in sample sets.
    pub fn sample(name: &str) -> Option<Self> {
        let cities = match name {
            "malawi" => vec![
                City::new("Blantyre", 0.0, 0.0),
                City::new("Lilongwe", 100.0, 150.0),
                City::new("Mzuzu", 50.0, 250.0),
                City::new("Zomba", 20.0, 30.0),
                City::new("Karonga", 80.0, 300.0),
                City::new("Mangochi", 120.0, 50.0),
            ],
            "grid10" => vec![
                City::new("City_A", 60.0, 200.0),
                City::new("City_B", 180.0, 200.0),
                City::new("City_C", 80.0, 180.0),
                City::new("City_D", 140.0, 180.0),
                City::new("City_E", 20.0, 160.0),
                City::new("City_F", 100.0, 160.0),
                City::new("City_G", 200.0, 160.0),
                City::new("City_H", 140.0, 140.0),
                City::new("City_I", 40.0, 120.0),
                City::new("City_J", 100.0, 120.0),
            ],
            _ => return None,
        };
        Some(CityInstance::new(name, cities))
    }

    /// `count` cities drawn uniformly from `[0, width) x [0, height)`.
    /// Deterministic via seed.
    pub fn random(count: usize, width: f64, height: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cities = (0..count)
            .map(|i| {
                City::new(
                    format!("C{}", i + 1),
                    rng.gen::<f64>() * width,
                    rng.gen::<f64>() * height,
                )
            })
            .collect();
        let mut instance = CityInstance::new(format!("random-{}-{}", count, seed), cities);
        instance.comment = format!("{} uniform random cities", count);
        instance
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let n = self.cities.len();

        let mut distances: Vec<f64> = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                distances.push(self.cities[i].distance_to(&self.cities[j]));
            }
        }

        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances
            .iter()
            .copied()
            .max_by_key(|&d| OrderedFloat(d))
            .unwrap_or(0.0);
        let min_distance = distances
            .iter()
            .copied()
            .min_by_key(|&d| OrderedFloat(d))
            .unwrap_or(0.0);
        let coincident_pairs = distances.iter().filter(|&&d| d == 0.0).count();

        let xs = self.cities.iter().map(|c| OrderedFloat(c.x()));
        let ys = self.cities.iter().map(|c| OrderedFloat(c.y()));
        let bounds = if n == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (
                xs.clone().min().map_or(0.0, |v| v.0),
                xs.max().map_or(0.0, |v| v.0),
                ys.clone().min().map_or(0.0, |v| v.0),
                ys.max().map_or(0.0, |v| v.0),
            )
        };

        InstanceStatistics {
            name: self.name.clone(),
            num_cities: n,
            min_x: bounds.0,
            max_x: bounds.1,
            min_y: bounds.2,
            max_y: bounds.3,
            avg_distance,
            min_distance,
            max_distance,
            coincident_pairs,
        }
    }
}

/// Statistics about a city set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_cities: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub coincident_pairs: usize,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Cities: {}", self.num_cities)?;
        writeln!(
            f,
            "  Bounding box: [{:.2}, {:.2}] x [{:.2}, {:.2}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.2}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)?;
        writeln!(f, "  Coincident pairs: {}", self.coincident_pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_TSP: &str = "NAME : square4
COMMENT : unit square
TYPE : TSP
DIMENSION : 4
EDGE_WEIGHT_TYPE : EUC_2D
NODE_COORD_SECTION
1 0 0
2 0 1
3 1 1
4 1 0
EOF
";

    #[test]
    fn test_parse_tsplib() {
        let instance = CityInstance::from_tsplib_reader(SMALL_TSP.as_bytes()).unwrap();
        assert_eq!(instance.name, "square4");
        assert_eq!(instance.comment, "unit square");
        assert_eq!(instance.len(), 4);
        assert_eq!(instance.cities[2], City::new("3", 1.0, 1.0));
    }

    #[test]
    fn test_parse_tsplib_rejects_bad_coordinate() {
        let text = "NODE_COORD_SECTION\n1 0 zero\nEOF\n";
        let result = CityInstance::from_tsplib_reader(text.as_bytes());
        assert!(matches!(result, Err(Error::InvalidInstance(_))));
    }

    #[test]
    fn test_parse_csv() {
        let text = "label,x,y\nBlantyre,0,0\nZomba,20.5,30\n";
        let instance = CityInstance::from_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(instance.len(), 2);
        assert_eq!(instance.cities[1], City::new("Zomba", 20.5, 30.0));
    }

    #[test]
    fn test_parse_csv_rejects_missing_column() {
        let text = "label,x\nBlantyre,0\n";
        assert!(matches!(
            CityInstance::from_csv_reader(text.as_bytes()),
            Err(Error::Csv(_))
        ));
    }

    #[test]
    fn test_samples() {
        for name in SAMPLE_NAMES {
            assert!(CityInstance::sample(name).is_some());
        }
        assert_eq!(CityInstance::sample("malawi").unwrap().len(), 6);
        assert_eq!(CityInstance::sample("grid10").unwrap().len(), 10);
        assert!(CityInstance::sample("atlantis").is_none());
    }

    #[test]
    fn test_random_is_deterministic() {
        let a = CityInstance::random(12, 100.0, 50.0, 3);
        let b = CityInstance::random(12, 100.0, 50.0, 3);
        assert_eq!(a.cities, b.cities);
        assert!(a
            .cities
            .iter()
            .all(|c| c.x() >= 0.0 && c.x() < 100.0 && c.y() >= 0.0 && c.y() < 50.0));
    }

    #[test]
    fn test_statistics() {
        let instance = CityInstance::from_tsplib_reader(SMALL_TSP.as_bytes()).unwrap();
        let stats = instance.statistics();
        assert_eq!(stats.num_cities, 4);
        assert_eq!((stats.min_x, stats.max_x, stats.min_y, stats.max_y), (0.0, 1.0, 0.0, 1.0));
        assert!((stats.min_distance - 1.0).abs() < 1e-12);
        assert!((stats.max_distance - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.coincident_pairs, 0);

        let empty = CityInstance::new("empty", Vec::new()).statistics();
        assert_eq!(empty.num_cities, 0);
        assert_eq!(empty.avg_distance, 0.0);
    }
}
