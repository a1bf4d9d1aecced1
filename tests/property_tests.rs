//! Property-based tests for the route optimizer and stop completion.
//!
//! # Invariants tested
//!
//! - **Tour shape:** depot first and last, every stop at most once.
//! - **Coverage:** visited and unreachable stops partition the input.
//! - **2-opt never hurts:** the final tour is no longer than the greedy one.
//! - **Determinism:** equal inputs give equal tours.
//! - **Run completion:** a run finishes exactly on its last completion.

mod fixtures;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use dispatch_planner::clock::FixedClock;
use dispatch_planner::config::DispatchConfig;
use dispatch_planner::dispatch::{DispatchOrchestrator, DriverId, RunStatus, StopCompletion};
use dispatch_planner::haversine::HaversineMatrix;
use dispatch_planner::matrix::MatrixEntry;
use dispatch_planner::solver::{OptimizeOptions, RouteOptimizer, RouteSolution};
use dispatch_planner::traits::DistanceMatrixProvider;
use dispatch_planner::waypoint::{Location, OrderId, Waypoint, WaypointSet};

use fixtures::NamedPlace;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
}

/// Stops within ~10km of Londrina, each optionally overdue.
fn stops_strategy(max: usize) -> impl Strategy<Value = Vec<(f64, f64, bool)>> {
    prop::collection::vec((-23.40..-23.25f64, -51.25..-51.05f64, any::<bool>()), 1..=max)
}

fn waypoint_set(stops: &[(f64, f64, bool)]) -> WaypointSet {
    WaypointSet::new(
        Location::new(-23.2658, -51.0529),
        stops.iter().enumerate().map(|(i, &(lat, lng, late))| {
            let deadline = late.then(|| now() - Duration::minutes(30));
            Waypoint::new(OrderId(i as i64 + 1), Location::new(lat, lng), deadline)
        }),
    )
    .unwrap()
}

fn solve(set: &WaypointSet, entries: &[MatrixEntry]) -> RouteSolution {
    RouteOptimizer::with_clock(FixedClock::new(now()), OptimizeOptions::default())
        .optimize(set, entries)
        .unwrap()
}

fn assert_valid_tour(solution: &RouteSolution, stop_count: usize) -> Result<(), TestCaseError> {
    let indices = solution.tour.indices();
    prop_assert_eq!(indices.first(), Some(&0));
    prop_assert_eq!(indices.last(), Some(&0));

    let visits = solution.tour.visits();
    let unique: HashSet<usize> = visits.iter().copied().collect();
    prop_assert_eq!(unique.len(), visits.len(), "a stop was visited twice");
    prop_assert!(visits.iter().all(|&i| (1..=stop_count).contains(&i)));

    let mut covered: Vec<usize> = visits.iter().chain(&solution.unreachable).copied().collect();
    covered.sort_unstable();
    prop_assert_eq!(covered, (1..=stop_count).collect::<Vec<_>>());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn complete_matrix_gives_full_tour(stops in stops_strategy(9)) {
        let set = waypoint_set(&stops);
        let entries = HaversineMatrix::default().compute_matrix(&set.locations()).unwrap();
        let solution = solve(&set, &entries);

        assert_valid_tour(&solution, stops.len())?;
        prop_assert!(solution.unreachable.is_empty());
    }

    #[test]
    fn two_opt_never_lengthens_tour(stops in stops_strategy(9)) {
        let set = waypoint_set(&stops);
        let entries = HaversineMatrix::default().compute_matrix(&set.locations()).unwrap();
        let solution = solve(&set, &entries);

        prop_assert!(solution.duration_seconds <= solution.constructed_duration_seconds);
    }

    #[test]
    fn optimization_is_deterministic(stops in stops_strategy(9)) {
        let set = waypoint_set(&stops);
        let entries = HaversineMatrix::default().compute_matrix(&set.locations()).unwrap();

        prop_assert_eq!(solve(&set, &entries).tour, solve(&set, &entries).tour);
    }

    /// Failing random pairs off the depot row still yields a valid partition.
    #[test]
    fn failed_pairs_keep_tour_valid(
        stops in stops_strategy(7),
        failures in prop::collection::vec(any::<bool>(), 64),
    ) {
        let set = waypoint_set(&stops);
        let n = set.len();
        let entries: Vec<MatrixEntry> = HaversineMatrix::default()
            .compute_matrix(&set.locations())
            .unwrap()
            .into_iter()
            .map(|e| {
                let slot = (e.origin_index * n + e.destination_index) % failures.len();
                if e.origin_index != 0 && failures[slot] {
                    MatrixEntry::failed(e.origin_index, e.destination_index, "no route found")
                } else {
                    e
                }
            })
            .collect();

        let solution = solve(&set, &entries);
        assert_valid_tour(&solution, stops.len())?;
    }

    #[test]
    fn run_finishes_on_last_completion(
        order in (1usize..=6).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
    ) {
        let places: Vec<NamedPlace> = fixtures::all_places().into_iter().take(order.len()).collect();
        let store = fixtures::seeded_store(&places);
        let orchestrator = DispatchOrchestrator::with_clock(
            store,
            HaversineMatrix::default(),
            Arc::new(FixedClock::new(now())),
            DispatchConfig::default(),
        );
        let run = orchestrator
            .create_run(DriverId(1), &fixtures::order_ids(order.len()))
            .unwrap()
            .run;

        for (done, &position) in order.iter().enumerate() {
            let outcome = orchestrator
                .complete_stop(DriverId(1), run.id, run.stops[position].id)
                .unwrap();
            let last = done + 1 == order.len();
            prop_assert_eq!(matches!(outcome, StopCompletion::RunFinished(_)), last);
            let status = orchestrator.find_run(run.id).unwrap().status;
            prop_assert_eq!(status == RunStatus::Finished, last);
        }
    }
}

