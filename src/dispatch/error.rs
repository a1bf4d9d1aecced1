use thiserror::Error;

use super::model::{DriverId, OrderId, OrderStatus, RunId, RunStatus, StopId, StopStatus};
use super::store::StoreError;
use crate::matrix::MatrixError;
use crate::solver::OptimizeError;
use crate::waypoint::WaypointError;

/// Errors returned by [`crate::dispatch::DispatchOrchestrator`].
///
/// Every variant except `TransientIo` and `Persistence` is raised before any
/// write is committed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("driver {0} not found")]
    DriverNotFound(DriverId),
    #[error("driver {0} is not active")]
    InactiveDriver(DriverId),
    #[error("orders not found: {0:?}")]
    OrderNotFound(Vec<OrderId>),
    #[error("order {order_id} is {status:?}, expected AwaitingRoute")]
    InvalidOrderState { order_id: OrderId, status: OrderStatus },
    #[error("not enough distance data to build a route")]
    InsufficientData,
    #[error("driver {driver_id} is not assigned to run {run_id}")]
    Forbidden { driver_id: DriverId, run_id: RunId },
    #[error("run {0} not found")]
    RunNotFound(RunId),
    #[error("run {run_id} is {status:?}")]
    InvalidRunState { run_id: RunId, status: RunStatus },
    #[error("stop {stop_id} does not belong to run {run_id}")]
    StopNotFound { run_id: RunId, stop_id: StopId },
    #[error("stop {stop_id} is {status:?}, expected Pending")]
    InvalidStopState { stop_id: StopId, status: StopStatus },
    #[error("distance matrix unavailable: {0}")]
    TransientIo(#[from] MatrixError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl DispatchError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientIo(_) | Self::Persistence(StoreError::Conflict(_))
        )
    }
}

impl From<WaypointError> for DispatchError {
    fn from(err: WaypointError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<OptimizeError> for DispatchError {
    fn from(err: OptimizeError) -> Self {
        match err {
            OptimizeError::InsufficientData | OptimizeError::Unreachable { .. } => {
                Self::InsufficientData
            }
            OptimizeError::IndexOutOfRange { .. } => Self::Validation(err.to_string()),
        }
    }
}
