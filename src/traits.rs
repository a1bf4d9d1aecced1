//! Core seams for the dispatch planner.
//!
//! Embedding apps supply the distance source; tests usually supply a fixed
//! clock as well.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::matrix::{MatrixEntry, MatrixError};
use crate::waypoint::Location;

/// Provides pairwise travel distance and duration for a set of locations.
///
/// Entries are indexed by the provided location order. A pair the provider
/// could not route is returned as a failed [`MatrixEntry`] rather than an
/// `Err`; `Err` is reserved for failures of the call itself (transport,
/// authentication, malformed response).
pub trait DistanceMatrixProvider {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError>;
}

impl<P: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for &P {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError> {
        (**self).compute_matrix(points)
    }
}

impl<P: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for Arc<P> {
    fn compute_matrix(&self, points: &[Location]) -> Result<Vec<MatrixEntry>, MatrixError> {
        (**self).compute_matrix(points)
    }
}

/// Source of "now" for deadline checks and completion timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
