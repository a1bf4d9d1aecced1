//! In-memory `DispatchStore`.
//!
//! Transactions are serialized by a single mutex and applied to a working
//! copy that replaces the committed state only when the work succeeds, so a
//! panic inside the work leaves the committed state intact. Not durable;
//! meant for tests and for wiring examples.

use std::collections::BTreeMap;
#[cfg(any(test, feature = "test-support"))]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::error::DispatchError;
use super::model::{
    Driver, DriverId, NewStop, Order, OrderId, OrderStatus, Run, RunId, RunStatus, Stop, StopId,
    StopStatus,
};
use super::store::{DispatchStore, DispatchTransaction, RunWindow, StoreError};

#[derive(Debug, Clone)]
struct RunRow {
    id: RunId,
    driver_id: DriverId,
    status: RunStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: BTreeMap<OrderId, Order>,
    drivers: BTreeMap<DriverId, Driver>,
    runs: BTreeMap<RunId, RunRow>,
    stops: BTreeMap<StopId, Stop>,
    next_run_id: i64,
    next_stop_id: i64,
}

impl MemoryState {
    fn assemble_run(&self, id: RunId) -> Option<Run> {
        let row = self.runs.get(&id)?;
        let mut stops: Vec<Stop> = self
            .stops
            .values()
            .filter(|stop| stop.run_id == id)
            .cloned()
            .collect();
        stops.sort_by_key(|stop| stop.sequence_number);
        Some(Run {
            id: row.id,
            driver_id: row.driver_id,
            status: row.status,
            created_at: row.created_at,
            stops,
        })
    }

    fn orders_by_ids(&self, ids: &[OrderId]) -> Vec<Order> {
        ids.iter().filter_map(|id| self.orders.get(id).cloned()).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    #[cfg(any(test, feature = "test-support"))]
    fail_next_order_update: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        self.lock().orders.insert(order.id, order);
        Ok(())
    }

    pub fn insert_driver(&self, driver: Driver) -> Result<(), StoreError> {
        self.lock().drivers.insert(driver.id, driver);
        Ok(())
    }

    pub fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    pub fn run_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock().runs.len())
    }

    pub fn stop_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock().stops.len())
    }

    /// Makes the next order status update inside a transaction fail.
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_next_order_update(&self) {
        self.fail_next_order_update.store(true, Ordering::SeqCst);
    }
}

impl DispatchStore for MemoryStore {
    fn find_orders_by_ids(&self, ids: &[OrderId]) -> Result<Vec<Order>, StoreError> {
        Ok(self.lock().orders_by_ids(ids))
    }

    fn find_driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        Ok(self.lock().drivers.get(&id).cloned())
    }

    fn find_run(&self, id: RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.lock().assemble_run(id))
    }

    fn find_runs(&self, driver_id: Option<DriverId>, window: &RunWindow) -> Result<Vec<Run>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<&RunRow> = state
            .runs
            .values()
            .filter(|row| driver_id.is_none_or(|id| row.driver_id == id))
            .filter(|row| window.contains(row.created_at))
            .collect();
        rows.sort_by_key(|row| (row.created_at, row.id));
        Ok(rows
            .into_iter()
            .filter_map(|row| state.assemble_run(row.id))
            .collect())
    }

    fn in_transaction<T, F>(&self, work: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut dyn DispatchTransaction) -> Result<T, DispatchError>,
    {
        let mut committed = self.lock();
        let mut tx = MemoryTransaction {
            state: committed.clone(),
            #[cfg(any(test, feature = "test-support"))]
            fail_next_order_update: &self.fail_next_order_update,
            #[cfg(not(any(test, feature = "test-support")))]
            _store: std::marker::PhantomData,
        };
        let value = work(&mut tx)?;
        *committed = tx.state;
        Ok(value)
    }
}

struct MemoryTransaction<'a> {
    state: MemoryState,
    #[cfg(any(test, feature = "test-support"))]
    fail_next_order_update: &'a AtomicBool,
    #[cfg(not(any(test, feature = "test-support")))]
    _store: std::marker::PhantomData<&'a MemoryStore>,
}

impl MemoryTransaction<'_> {
    #[cfg(any(test, feature = "test-support"))]
    fn injected_failure(&self) -> bool {
        self.fail_next_order_update.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(any(test, feature = "test-support")))]
    fn injected_failure(&self) -> bool {
        false
    }
}

impl DispatchTransaction for MemoryTransaction<'_> {
    fn lock_orders(&mut self, ids: &[OrderId]) -> Result<Vec<Order>, StoreError> {
        Ok(self.state.orders_by_ids(ids))
    }

    fn create_run_and_stops(
        &mut self,
        driver_id: DriverId,
        created_at: DateTime<Utc>,
        stops: &[NewStop],
    ) -> Result<RunId, StoreError> {
        if !self.state.drivers.contains_key(&driver_id) {
            return Err(StoreError::NotFound(format!("driver {driver_id}")));
        }

        self.state.next_run_id += 1;
        let run_id = RunId(self.state.next_run_id);
        self.state.runs.insert(
            run_id,
            RunRow {
                id: run_id,
                driver_id,
                status: RunStatus::InProgress,
                created_at,
            },
        );

        for new_stop in stops {
            self.state.next_stop_id += 1;
            let stop_id = StopId(self.state.next_stop_id);
            self.state.stops.insert(
                stop_id,
                Stop {
                    id: stop_id,
                    run_id,
                    order_id: new_stop.order_id,
                    sequence_number: new_stop.sequence_number,
                    status: StopStatus::Pending,
                    completed_at: None,
                },
            );
        }

        Ok(run_id)
    }

    fn update_order_statuses(&mut self, ids: &[OrderId], status: OrderStatus) -> Result<(), StoreError> {
        if self.injected_failure() {
            return Err(StoreError::Backend("injected order update failure".to_string()));
        }
        for id in ids {
            let order = self
                .state
                .orders
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;
            order.status = status;
        }
        Ok(())
    }

    fn update_stop_status(
        &mut self,
        id: StopId,
        status: StopStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let stop = self
            .state
            .stops
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("stop {id}")))?;
        stop.status = status;
        stop.completed_at = completed_at;
        Ok(())
    }

    fn update_run_status(&mut self, id: RunId, status: RunStatus) -> Result<(), StoreError> {
        let run = self
            .state
            .runs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run.status = status;
        Ok(())
    }

    fn read_run_with_stops(&mut self, id: RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.state.assemble_run(id))
    }
}
