//! Module for parsing and representing Euclidean TSP instances.
//!
//! Two text formats are accepted: the plain point list (a count on the first
//! line, then one `x y` pair per line) and TSP-LIB files with a
//! `NODE_COORD_SECTION`. Points are renumbered from 0 in file order.

use crate::error::{Result, TspError};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest instance the search accepts.
pub const MIN_POINTS: usize = 3;

/// Represents a complete Euclidean TSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TspInstance {
    /// Name of the instance (file stem or TSP-LIB `NAME`)
    pub name: String,
    /// All points, `points[i].id == i`
    pub points: Vec<Point>,
}

impl TspInstance {
    /// Build an instance from raw coordinates.
    pub fn from_coordinates(name: &str, coords: &[(f64, f64)]) -> Self {
        let points = coords
            .iter()
            .enumerate()
            .map(|(id, &(x, y))| Point::new(id, x, y))
            .collect();
        TspInstance {
            name: name.to_string(),
            points,
        }
    }

    /// Load an instance from a file, detecting the format from its content.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut instance = if text.contains("NODE_COORD_SECTION") {
            Self::parse_tsplib(&text)?
        } else {
            Self::parse(&stem, &text)?
        };
        if instance.name.is_empty() {
            instance.name = stem;
        }
        Ok(instance)
    }

    /// Parse the plain point-list format.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| TspError::invalid_input("empty input"))?;
        let count: usize = header
            .parse()
            .map_err(|_| TspError::invalid_input(format!("invalid point count '{}'", header)))?;

        // Grown from the lines actually read, never sized by the header.
        let mut points = Vec::new();
        for id in 0..count {
            let line = lines.next().ok_or_else(|| {
                TspError::invalid_input(format!("expected {} points, found {}", count, id))
            })?;
            let (x, y) = parse_xy(line)?;
            points.push(Point::new(id, x, y));
        }

        Ok(TspInstance {
            name: name.to_string(),
            points,
        })
    }

    /// Parse a TSP-LIB file with EUC_2D coordinates.
    pub fn parse_tsplib(text: &str) -> Result<Self> {
        let mut name = String::new();
        let mut dimension: Option<usize> = None;
        let mut points = Vec::new();
        let mut in_coords = false;

        for line in text.lines() {
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

            if in_coords {
                // Another section ends the coordinates.
                if line.ends_with("_SECTION") {
                    in_coords = false;
                    continue;
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 3 {
                    return Err(TspError::invalid_input(format!(
                        "malformed coordinate line '{}'",
                        line
                    )));
                }
                let (x, y) = parse_xy(&parts[1..].join(" "))?;
                points.push(Point::new(points.len(), x, y));
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                match key.trim() {
                    "NAME" => name = value.trim().to_string(),
                    "DIMENSION" => {
                        dimension = Some(value.trim().parse().map_err(|_| {
                            TspError::invalid_input(format!("invalid dimension '{}'", value.trim()))
                        })?)
                    }
                    "EDGE_WEIGHT_TYPE" => {
                        let kind = value.trim();
                        if kind != "EUC_2D" {
                            log::warn!("edge weight type {} treated as EUC_2D", kind);
                        }
                    }
                    _ => {}
                }
            }
        }

        if let Some(dimension) = dimension {
            if dimension != points.len() {
                return Err(TspError::invalid_input(format!(
                    "DIMENSION is {} but {} coordinates were read",
                    dimension,
                    points.len()
                )));
            }
        }

        Ok(TspInstance { name, points })
    }

    /// Reject instances the search cannot handle.
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < MIN_POINTS {
            return Err(TspError::DegenerateInstance(self.points.len()));
        }
        if let Some(p) = self
            .points
            .iter()
            .find(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(TspError::invalid_input(format!(
                "point {} has non-finite coordinates",
                p.id
            )));
        }
        Ok(())
    }

    /// Number of points.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.points.len()
    }

    /// Euclidean distance between two points.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.points[i].distance(&self.points[j])
    }

    /// Calculate the length of a closed tour
    pub fn tour_length(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }

        let mut length = 0.0;
        for i in 0..tour.len() - 1 {
            length += self.distance(tour[i], tour[i + 1]);
        }

        length += self.distance(tour[tour.len() - 1], tour[0]);

        length
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;

        for p in &self.points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
            sum_x += p.x;
            sum_y += p.y;
        }

        let n = self.points.len().max(1) as f64;

        // Nearest-neighbour distances on an evenly spaced sample keep this O(n) per point.
        let sample_step = (self.points.len() / NN_SAMPLE_SIZE).max(1);
        let mut nn_sum = 0.0;
        let mut nn_count = 0usize;
        for p in self.points.iter().step_by(sample_step) {
            let nearest = self
                .points
                .iter()
                .filter(|q| q.id != p.id)
                .map(|q| p.distance(q))
                .fold(f64::INFINITY, f64::min);
            if nearest.is_finite() {
                nn_sum += nearest;
                nn_count += 1;
            }
        }

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.points.len(),
            min_x,
            max_x,
            min_y,
            max_y,
            centroid_x: sum_x / n,
            centroid_y: sum_y / n,
            avg_nearest_distance: if nn_count > 0 {
                nn_sum / nn_count as f64
            } else {
                0.0
            },
        }
    }
}

const NN_SAMPLE_SIZE: usize = 1000;

fn parse_xy(line: &str) -> Result<(f64, f64)> {
    let mut parts = line.split_whitespace();
    let x = parts
        .next()
        .ok_or_else(|| TspError::invalid_input(format!("missing x coordinate in '{}'", line)))?;
    let y = parts
        .next()
        .ok_or_else(|| TspError::invalid_input(format!("missing y coordinate in '{}'", line)))?;
    let x: f64 = x
        .parse()
        .map_err(|_| TspError::invalid_input(format!("invalid x coordinate '{}'", x)))?;
    let y: f64 = y
        .parse()
        .map_err(|_| TspError::invalid_input(format!("invalid y coordinate '{}'", y)))?;
    Ok((x, y))
}

/// Statistics about a TSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub avg_nearest_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Points: {}", self.dimension)?;
        writeln!(
            f,
            "  Bounding box: [{:.2}, {:.2}] x [{:.2}, {:.2}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )?;
        writeln!(f, "  Centroid: ({:.2}, {:.2})", self.centroid_x, self.centroid_y)?;
        writeln!(f, "  Avg nearest-neighbour distance: {:.2}", self.avg_nearest_distance)
    }
}
