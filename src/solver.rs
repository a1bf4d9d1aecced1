//! Route optimizer: greedy nearest-time construction refined by 2-opt.
//!
//! The optimizer is pure computation over an already materialized matrix.
//! It holds no state between calls, so one instance can serve many threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::SystemClock;
use crate::matrix::{EdgeMatrix, MatrixEntry};
use crate::traits::Clock;
use crate::waypoint::{OrderId, WaypointSet};

/// Discount applied to an overdue waypoint's travel duration during construction.
pub const LATE_PRIORITY_FACTOR: f64 = 0.5;

/// Index of the depot in every waypoint set and tour.
pub const DEPOT_INDEX: usize = 0;

/// Minimum gain, in seconds, for a 2-opt move to count as an improvement.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// What to do with waypoints construction could not reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnreachablePolicy {
    /// Leave them out of the tour and report them in [`RouteSolution::unreachable`].
    #[default]
    Drop,
    /// Visit them after the reachable ones, in input order.
    AppendInInputOrder,
    /// Fail the optimization with [`OptimizeError::Unreachable`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizeOptions {
    /// Multiplier for the duration towards an already late waypoint.
    pub late_priority_factor: f64,
    pub unreachable: UnreachablePolicy,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            late_priority_factor: LATE_PRIORITY_FACTOR,
            unreachable: UnreachablePolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    /// No usable edge leaves the depot.
    #[error("distance matrix has no usable edge out of the depot")]
    InsufficientData,
    #[error("matrix entry references waypoint {index}, but only {len} waypoints were given")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("waypoints {indices:?} are unreachable")]
    Unreachable { indices: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TourError {
    #[error("tour must start and end at the depot")]
    NotDepotBounded,
    #[error("waypoint {0} appears more than once in the tour")]
    RepeatedVisit(usize),
}

/// A depot-bounded visiting order over waypoint indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Tour {
    indices: Vec<usize>,
}

impl TryFrom<Vec<usize>> for Tour {
    type Error = TourError;

    /// Accepts a full sequence with the depot at both ends and nowhere else.
    fn try_from(indices: Vec<usize>) -> Result<Self, Self::Error> {
        let [DEPOT_INDEX, visits @ .., DEPOT_INDEX] = indices.as_slice() else {
            return Err(TourError::NotDepotBounded);
        };
        let mut seen = std::collections::HashSet::with_capacity(visits.len());
        for &index in visits {
            if index == DEPOT_INDEX || !seen.insert(index) {
                return Err(TourError::RepeatedVisit(index));
            }
        }
        Ok(Self { indices })
    }
}

impl From<Tour> for Vec<usize> {
    fn from(tour: Tour) -> Self {
        tour.indices
    }
}

impl Tour {
    /// Wraps `visits` with the depot at both ends.
    pub fn from_visits(visits: impl IntoIterator<Item = usize>) -> Self {
        let mut indices = vec![DEPOT_INDEX];
        indices.extend(visits);
        indices.push(DEPOT_INDEX);
        Self { indices }
    }

    /// Full sequence, depot first and last.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The non-depot positions in visiting order.
    pub fn visits(&self) -> &[usize] {
        &self.indices[1..self.indices.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits().is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Sum of raw durations; infinite if any edge is unusable.
    pub fn duration_seconds(&self, matrix: &EdgeMatrix) -> f64 {
        self.edges().map(|(from, to)| matrix.cost(from, to)).sum()
    }

    /// Sum of durations with unusable edges contributing nothing.
    pub fn known_duration_seconds(&self, matrix: &EdgeMatrix) -> f64 {
        self.edges()
            .filter_map(|(from, to)| matrix.duration(from, to))
            .sum()
    }

    /// Sum of distances with unusable edges contributing nothing.
    pub fn distance_meters(&self, matrix: &EdgeMatrix) -> f64 {
        self.edges()
            .filter_map(|(from, to)| matrix.distance(from, to))
            .sum()
    }
}

/// Output of [`nearest_neighbour`].
#[derive(Debug, Clone, PartialEq)]
pub struct Construction {
    pub tour: Tour,
    /// Waypoints with no usable edge from wherever construction stalled.
    pub unvisited: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSolution {
    pub tour: Tour,
    /// Raw duration of the constructed tour before 2-opt.
    pub constructed_duration_seconds: f64,
    /// Raw duration of the final tour.
    pub duration_seconds: f64,
    pub total_distance_meters: f64,
    /// Total known duration in minutes, rounded to two decimals.
    pub total_duration_minutes: f64,
    /// Waypoints left out of the tour under [`UnreachablePolicy::Drop`].
    pub unreachable: Vec<usize>,
    pub improvements: usize,
}

impl RouteSolution {
    /// Order ids in visiting order, depot excluded.
    pub fn order_sequence(&self, waypoints: &WaypointSet) -> Vec<OrderId> {
        self.tour
            .visits()
            .iter()
            .filter_map(|&index| waypoints.order_id_at(index))
            .collect()
    }
}

/// Deadline-aware nearest-neighbour optimizer with 2-opt refinement.
#[derive(Debug, Clone, Default)]
pub struct RouteOptimizer<C = SystemClock> {
    clock: C,
    options: OptimizeOptions,
}

impl RouteOptimizer<SystemClock> {
    pub fn new(options: OptimizeOptions) -> Self {
        Self::with_clock(SystemClock, options)
    }
}

impl<C: Clock> RouteOptimizer<C> {
    pub fn with_clock(clock: C, options: OptimizeOptions) -> Self {
        Self { clock, options }
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    pub fn optimize(
        &self,
        waypoints: &WaypointSet,
        entries: &[MatrixEntry],
    ) -> Result<RouteSolution, OptimizeError> {
        let len = waypoints.len();
        if let Some(entry) = entries
            .iter()
            .find(|e| e.origin_index >= len || e.destination_index >= len)
        {
            return Err(OptimizeError::IndexOutOfRange {
                index: entry.origin_index.max(entry.destination_index),
                len,
            });
        }

        let matrix = EdgeMatrix::from_entries(entries);
        if matrix.failed_count() > 0 {
            warn!(
                failed = matrix.failed_count(),
                usable = matrix.usable_count(),
                "distance matrix contains unusable pairs"
            );
        }
        if !matrix.has_usable_edge_from(DEPOT_INDEX, len) {
            return Err(OptimizeError::InsufficientData);
        }

        let now = self.clock.now();
        let Construction { mut tour, unvisited } =
            nearest_neighbour(waypoints, &matrix, now, self.options.late_priority_factor);

        let mut unreachable = Vec::new();
        if !unvisited.is_empty() {
            match self.options.unreachable {
                UnreachablePolicy::Drop => {
                    warn!(?unvisited, "dropping waypoints unreachable from the constructed route");
                    unreachable = unvisited;
                }
                UnreachablePolicy::AppendInInputOrder => {
                    warn!(?unvisited, "appending unreachable waypoints to the end of the route");
                    tour = Tour::from_visits(tour.visits().iter().copied().chain(unvisited));
                }
                UnreachablePolicy::Reject => {
                    return Err(OptimizeError::Unreachable { indices: unvisited });
                }
            }
        }

        let constructed_duration_seconds = tour.duration_seconds(&matrix);
        let improvements = two_opt(&mut tour, &matrix);
        let duration_seconds = tour.duration_seconds(&matrix);
        debug!(
            improvements,
            before = constructed_duration_seconds,
            after = duration_seconds,
            "2-opt finished"
        );

        let total_distance_meters = tour.distance_meters(&matrix);
        let total_duration_minutes = round_to_hundredths(tour.known_duration_seconds(&matrix) / 60.0);

        Ok(RouteSolution {
            tour,
            constructed_duration_seconds,
            duration_seconds,
            total_distance_meters,
            total_duration_minutes,
            unreachable,
            improvements,
        })
    }
}

/// Greedy construction from the depot.
///
/// At each step the unvisited waypoint with the smallest effective duration
/// from the current node is taken; a waypoint whose deadline is before `now`
/// has its duration multiplied by `late_priority_factor`. Candidates without a
/// usable edge are skipped. Ties keep the earliest index. When no candidate is
/// reachable the tour is closed and the rest are returned as unvisited.
pub fn nearest_neighbour(
    waypoints: &WaypointSet,
    matrix: &EdgeMatrix,
    now: DateTime<Utc>,
    late_priority_factor: f64,
) -> Construction {
    let mut unvisited: Vec<usize> = (1..waypoints.len()).collect();
    let mut visits = Vec::with_capacity(unvisited.len());
    let mut current = DEPOT_INDEX;

    while !unvisited.is_empty() {
        let mut best: Option<(usize, f64)> = None;

        for (position, &candidate) in unvisited.iter().enumerate() {
            let Some(mut duration) = matrix.duration(current, candidate) else {
                continue;
            };
            if waypoints.get(candidate).is_some_and(|w| w.is_late(now)) {
                duration *= late_priority_factor;
            }
            if best.is_none_or(|(_, best_duration)| duration < best_duration) {
                best = Some((position, duration));
            }
        }

        let Some((position, duration)) = best else {
            debug!(from = current, remaining = unvisited.len(), "construction stalled");
            break;
        };

        current = unvisited.remove(position);
        debug!(next = current, effective_duration = duration, "construction pick");
        visits.push(current);
    }

    Construction {
        tour: Tour::from_visits(visits),
        unvisited,
    }
}

/// Improves `tour` in place with 2-opt until no move helps.
///
/// Each pass scans `1 <= i`, `i + 2 <= j <= len - 2` and applies the first
/// pair whose reversal of `tour[i + 1..=j]` lowers the cost of the edges it
/// changes, then restarts. The depot endpoints never move. Returns the number
/// of moves applied.
pub fn two_opt(tour: &mut Tour, matrix: &EdgeMatrix) -> usize {
    let mut improvements = 0;
    while let Some((i, j)) = find_improving_move(&tour.indices, matrix) {
        tour.indices[i + 1..=j].reverse();
        improvements += 1;
    }
    improvements
}

fn find_improving_move(tour: &[usize], matrix: &EdgeMatrix) -> Option<(usize, usize)> {
    let n = tour.len();
    if n < 5 {
        return None;
    }

    for i in 1..n - 3 {
        for j in i + 2..n - 1 {
            let before = reversal_cost_before(tour, i, j, matrix);
            let after = reversal_cost_after(tour, i, j, matrix);
            if after < before - IMPROVEMENT_EPSILON {
                return Some((i, j));
            }
        }
    }

    None
}

/// Cost of `tour[i] -> ... -> tour[j + 1]` as it stands.
fn reversal_cost_before(tour: &[usize], i: usize, j: usize, matrix: &EdgeMatrix) -> f64 {
    (i..=j).map(|k| matrix.cost(tour[k], tour[k + 1])).sum()
}

/// Cost of the same stretch once `tour[i + 1..=j]` is reversed.
///
/// The interior edges are counted because they flip direction, which matters
/// when the matrix is asymmetric.
fn reversal_cost_after(tour: &[usize], i: usize, j: usize, matrix: &EdgeMatrix) -> f64 {
    let interior: f64 = (i + 1..j).map(|k| matrix.cost(tour[k + 1], tour[k])).sum();
    matrix.cost(tour[i], tour[j]) + interior + matrix.cost(tour[i + 1], tour[j + 1])
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
