//! Distance/duration matrix entries and the indexed edge lookup built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One directed origin → destination result from a distance provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub origin_index: usize,
    pub destination_index: usize,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub failed: bool,
    pub error_message: Option<String>,
}

impl MatrixEntry {
    pub fn ok(origin_index: usize, destination_index: usize, distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            origin_index,
            destination_index,
            distance_meters: Some(distance_meters),
            duration_seconds: Some(duration_seconds),
            failed: false,
            error_message: None,
        }
    }

    pub fn failed(origin_index: usize, destination_index: usize, message: impl Into<String>) -> Self {
        Self {
            origin_index,
            destination_index,
            distance_meters: None,
            duration_seconds: None,
            failed: true,
            error_message: Some(message.into()),
        }
    }

    /// A failed entry or one without a finite duration cannot be travelled.
    pub fn is_usable(&self) -> bool {
        !self.failed && self.duration_seconds.is_some_and(|d| d.is_finite() && d >= 0.0)
    }
}

/// Errors from [`crate::traits::DistanceMatrixProvider::compute_matrix`].
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("at least one location is required")]
    EmptyInput,
    #[error("distance provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("distance provider returned {code}: {message}")]
    Status { code: String, message: String },
    #[error("malformed distance provider response: {0}")]
    Malformed(String),
    #[error("distance provider API key is not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    distance_meters: Option<f64>,
    duration_seconds: f64,
}

/// Usable directed edges keyed by `(origin, destination)`.
///
/// Failed and duration-less entries are dropped on construction, so any pair
/// not present is unusable and costs `f64::INFINITY`.
#[derive(Debug, Clone, Default)]
pub struct EdgeMatrix {
    edges: HashMap<(usize, usize), Edge>,
    failed: usize,
}

impl EdgeMatrix {
    pub fn from_entries(entries: &[MatrixEntry]) -> Self {
        let mut edges = HashMap::with_capacity(entries.len());
        let mut failed = 0;
        for entry in entries {
            if !entry.is_usable() {
                failed += 1;
                continue;
            }
            if let Some(duration_seconds) = entry.duration_seconds {
                // Later duplicates win, matching a provider that re-sends a pair.
                edges.insert(
                    (entry.origin_index, entry.destination_index),
                    Edge {
                        distance_meters: entry.distance_meters.filter(|d| d.is_finite()),
                        duration_seconds,
                    },
                );
            }
        }
        Self { edges, failed }
    }

    pub fn duration(&self, from: usize, to: usize) -> Option<f64> {
        self.edges.get(&(from, to)).map(|e| e.duration_seconds)
    }

    pub fn distance(&self, from: usize, to: usize) -> Option<f64> {
        self.edges.get(&(from, to)).and_then(|e| e.distance_meters)
    }

    /// Raw duration, infinite when the edge is unusable.
    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.duration(from, to).unwrap_or(f64::INFINITY)
    }

    pub fn is_usable(&self, from: usize, to: usize) -> bool {
        self.edges.contains_key(&(from, to))
    }

    /// Whether any usable edge leaves `origin` for another node in `0..node_count`.
    pub fn has_usable_edge_from(&self, origin: usize, node_count: usize) -> bool {
        (0..node_count).any(|to| to != origin && self.is_usable(origin, to))
    }

    pub fn usable_count(&self) -> usize {
        self.edges.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_and_missing_entries_are_unusable() {
        let entries = vec![
            MatrixEntry::ok(0, 1, 1200.0, 90.0),
            MatrixEntry::failed(1, 0, "ROUTE_NOT_FOUND"),
            MatrixEntry {
                origin_index: 0,
                destination_index: 2,
                distance_meters: Some(10.0),
                duration_seconds: None,
                failed: false,
                error_message: None,
            },
        ];
        let matrix = EdgeMatrix::from_entries(&entries);

        assert_eq!(matrix.duration(0, 1), Some(90.0));
        assert_eq!(matrix.distance(0, 1), Some(1200.0));
        assert!(!matrix.is_usable(1, 0));
        assert!(!matrix.is_usable(0, 2));
        assert_eq!(matrix.cost(1, 0), f64::INFINITY);
        assert_eq!(matrix.usable_count(), 1);
        assert_eq!(matrix.failed_count(), 2);
    }

    #[test]
    fn lookups_are_directed() {
        let matrix = EdgeMatrix::from_entries(&[MatrixEntry::ok(0, 1, 5.0, 5.0)]);
        assert!(matrix.is_usable(0, 1));
        assert!(!matrix.is_usable(1, 0));
        assert!(matrix.has_usable_edge_from(0, 2));
        assert!(!matrix.has_usable_edge_from(1, 2));
    }

    #[test]
    fn self_loops_do_not_count_as_leaving_edges() {
        let matrix = EdgeMatrix::from_entries(&[MatrixEntry::ok(0, 0, 0.0, 0.0)]);
        assert!(!matrix.has_usable_edge_from(0, 3));
    }
}
