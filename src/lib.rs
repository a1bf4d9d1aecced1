//! dispatch-planner
//!
//! Route optimization for delivery runs plus the dispatch workflow that
//! assigns optimized routes to drivers and tracks them to completion.

pub mod traits;
pub mod clock;
pub mod waypoint;
pub mod matrix;
pub mod solver;
pub mod osrm;
pub mod google_routes;
pub mod haversine;
pub mod config;
pub mod dispatch;

pub use clock::{FixedClock, SystemClock};
pub use config::DispatchConfig;
pub use matrix::{EdgeMatrix, MatrixEntry, MatrixError};
pub use solver::{
    OptimizeError, OptimizeOptions, RouteOptimizer, RouteSolution, TourError, UnreachablePolicy,
};
pub use traits::{Clock, DistanceMatrixProvider};
pub use waypoint::{Location, OrderId, Waypoint, WaypointSet};
