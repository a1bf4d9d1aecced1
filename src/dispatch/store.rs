//! Persistence contract the orchestrator depends on.
//!
//! Reads that do not need a consistent snapshot go through [`DispatchStore`]
//! directly. Every mutation goes through [`DispatchStore::in_transaction`],
//! whose work either commits as a whole or leaves no trace.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::error::DispatchError;
use super::model::{Driver, DriverId, NewStop, Order, OrderId, OrderStatus, Run, RunId, RunStatus, StopId, StopStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// Serialization failure or lock timeout; the transaction may be retried.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Half-open `[start, end)` creation-time window for run listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl RunWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at < end)
    }
}

pub trait DispatchStore {
    /// Loads the orders that exist among `ids`; missing ids are simply absent.
    fn find_orders_by_ids(&self, ids: &[OrderId]) -> Result<Vec<Order>, StoreError>;

    fn find_driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError>;

    /// Loads the driver only if it is active.
    fn find_active_driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        Ok(self.find_driver(id)?.filter(Driver::is_active))
    }

    fn find_run(&self, id: RunId) -> Result<Option<Run>, StoreError>;

    /// Runs created inside `window`, optionally for one driver, oldest first.
    fn find_runs(&self, driver_id: Option<DriverId>, window: &RunWindow) -> Result<Vec<Run>, StoreError>;

    /// Runs `work` in one transaction: commit on `Ok`, roll back on `Err`.
    fn in_transaction<T, F>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut dyn DispatchTransaction) -> Result<T, DispatchError>;
}

/// Operations available inside a transaction.
///
/// Row reads here lock what they return until the transaction ends, so
/// concurrent transactions touching the same run or orders are serialized.
pub trait DispatchTransaction {
    /// Loads and locks orders, like [`DispatchStore::find_orders_by_ids`].
    fn lock_orders(&mut self, ids: &[OrderId]) -> Result<Vec<Order>, StoreError>;

    /// Inserts an `InProgress` run with pending stops and returns its id.
    fn create_run_and_stops(
        &mut self,
        driver_id: DriverId,
        created_at: DateTime<Utc>,
        stops: &[NewStop],
    ) -> Result<RunId, StoreError>;

    fn update_order_statuses(&mut self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError>;

    fn update_stop_status(
        &mut self,
        id: StopId,
        status: StopStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    fn update_run_status(&mut self, id: RunId, status: RunStatus) -> Result<(), StoreError>;

    /// Loads and locks a run together with its whole stop set.
    fn read_run_with_stops(&mut self, id: RunId) -> Result<Option<Run>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap();
        let window = RunWindow {
            start: Some(start),
            end: Some(end),
        };
        assert!(window.contains(start));
        assert!(!window.contains(end));
        assert!(RunWindow::default().contains(end));
    }
}
