//! Straight-line travel estimates for when no road network is reachable.
//!
//! Distances ignore roads entirely, so durations are optimistic, but every
//! pair always gets an entry.

use rayon::prelude::*;

use crate::matrix::{MatrixEntry, MatrixError};
use crate::traits::DistanceMatrixProvider;
use crate::waypoint::Location;

/// Urban delivery speed, km/h.
const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Mean Earth radius.
const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Matrix provider pricing every pair at great-circle distance over a fixed
/// speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaversineMatrix {
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance in kilometers.
    pub fn haversine_km(from: Location, to: Location) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lng = (to.lng - from.lng).to_radians();

        let h = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }

    /// Convert distance in km to travel time in whole seconds.
    fn km_to_seconds(&self, km: f64) -> f64 {
        let hours = km / self.speed_kmh;
        (hours * 3600.0).round()
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError> {
        if points.is_empty() {
            return Err(MatrixError::EmptyInput);
        }

        let entries = points
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, from)| {
                points.iter().enumerate().map(move |(j, to)| {
                    if i == j {
                        MatrixEntry::ok(i, j, 0.0, 0.0)
                    } else {
                        let km = Self::haversine_km(*from, *to);
                        MatrixEntry::ok(i, j, (km * 1000.0).round(), self.km_to_seconds(km))
                    }
                })
            })
            .collect();

        Ok(entries)
    }
}
