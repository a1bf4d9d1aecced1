//! Creates delivery runs from optimized routes and drives them to completion.

use std::collections::HashSet;

use chrono::FixedOffset;
use tracing::{debug, info, warn};

use super::error::DispatchError;
use super::model::{
    DispatchedRun, DriverId, NewStop, Order, OrderId, OrderStatus, PlannedRun, RouteDetails, Run,
    RunId, RunStatus, StopCompletion, StopId, StopStatus,
};
use super::store::{DispatchStore, DispatchTransaction};
use super::window::RunFilter;
use crate::clock::SystemClock;
use crate::config::DispatchConfig;
use crate::solver::RouteOptimizer;
use crate::traits::{Clock, DistanceMatrixProvider};
use crate::waypoint::WaypointSet;

/// Dispatch entry point.
///
/// Every state change happens inside one store transaction, so a failed
/// call leaves runs, stops and orders exactly as they were. The `*_in`
/// steps take the caller's transaction instead, so several of them can
/// commit or roll back together through [`DispatchStore::in_transaction`].
pub struct DispatchOrchestrator<S, M, C = SystemClock> {
    store: S,
    matrix_provider: M,
    clock: C,
    config: DispatchConfig,
}

impl<S, M> DispatchOrchestrator<S, M, SystemClock>
where
    S: DispatchStore,
    M: DistanceMatrixProvider,
{
    pub fn new(store: S, matrix_provider: M, config: DispatchConfig) -> Self {
        Self::with_clock(store, matrix_provider, SystemClock, config)
    }
}

impl<S, M, C> DispatchOrchestrator<S, M, C>
where
    S: DispatchStore,
    M: DistanceMatrixProvider,
    C: Clock,
{
    pub fn with_clock(store: S, matrix_provider: M, clock: C, config: DispatchConfig) -> Self {
        Self {
            store,
            matrix_provider,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Optimizes a route over `order_ids` and assigns it to the driver as a
    /// new run.
    ///
    /// Orders are checked before the distance matrix is fetched and checked
    /// again under lock inside the transaction that creates the run, its
    /// stops and moves the orders to `InRoute`.
    pub fn create_run(
        &self,
        driver_id: DriverId,
        order_ids: &[OrderId],
    ) -> Result<DispatchedRun, DispatchError> {
        let plan = self.plan_run(driver_id, order_ids)?;
        let dispatched = self
            .store
            .in_transaction(|tx| self.create_run_in(tx, &plan))?;

        info!(
            run_id = %dispatched.run.id,
            %driver_id,
            stops = dispatched.run.stops.len(),
            total_minutes = dispatched.route.total_duration_minutes,
            "run created"
        );
        Ok(dispatched)
    }

    /// Validates the request and optimizes its route without writing
    /// anything.
    pub fn plan_run(
        &self,
        driver_id: DriverId,
        order_ids: &[OrderId],
    ) -> Result<PlannedRun, DispatchError> {
        validate_order_ids(order_ids)?;
        self.require_active_driver(driver_id)?;

        let orders = self.store.find_orders_by_ids(order_ids)?;
        check_orders(order_ids, &orders)?;

        let waypoints = WaypointSet::new(self.config.depot, orders.iter().map(Order::waypoint))?;
        let entries = self.matrix_provider.compute_matrix(&waypoints.locations())?;
        debug!(entries = entries.len(), "distance matrix received");

        let optimizer = RouteOptimizer::with_clock(&self.clock, self.config.optimize);
        let solution = optimizer.optimize(&waypoints, &entries)?;

        let optimized_sequence = solution.order_sequence(&waypoints);
        let unrouted_order_ids: Vec<OrderId> = solution
            .unreachable
            .iter()
            .filter_map(|&index| waypoints.order_id_at(index))
            .collect();
        if !unrouted_order_ids.is_empty() {
            warn!(%driver_id, unrouted = ?unrouted_order_ids, "orders left out of the route");
        }

        Ok(PlannedRun {
            driver_id,
            order_ids: order_ids.to_vec(),
            stops: NewStop::sequence(optimized_sequence.iter().copied()),
            route: RouteDetails {
                total_distance_meters: solution.total_distance_meters,
                total_duration_minutes: solution.total_duration_minutes,
                optimized_sequence,
                unrouted_order_ids,
            },
        })
    }

    /// Writes `plan` as a new run inside the caller's transaction.
    ///
    /// The orders are re-checked under lock, so a plan that went stale since
    /// [`plan_run`](Self::plan_run) fails with `InvalidOrderState`. Only `tx`
    /// is touched, never the store itself.
    pub fn create_run_in(
        &self,
        tx: &mut dyn DispatchTransaction,
        plan: &PlannedRun,
    ) -> Result<DispatchedRun, DispatchError> {
        let locked = tx.lock_orders(&plan.order_ids)?;
        check_orders(&plan.order_ids, &locked)?;

        let run_id = tx.create_run_and_stops(plan.driver_id, self.clock.now(), &plan.stops)?;
        tx.update_order_statuses(&plan.order_ids, OrderStatus::InRoute)?;

        Ok(DispatchedRun {
            run: read_run(tx, run_id)?,
            route: plan.route.clone(),
        })
    }

    /// Marks one pending stop of the driver's run as delivered.
    ///
    /// When it was the last pending stop the run is finished in the same
    /// transaction and returned; otherwise the updated stop is returned.
    pub fn complete_stop(
        &self,
        driver_id: DriverId,
        run_id: RunId,
        stop_id: StopId,
    ) -> Result<StopCompletion, DispatchError> {
        let outcome = self
            .store
            .in_transaction(|tx| self.complete_stop_in(tx, driver_id, run_id, stop_id))?;

        match &outcome {
            StopCompletion::RunFinished(run) => {
                info!(run_id = %run.id, %stop_id, "last stop completed, run finished");
            }
            StopCompletion::StopCompleted(stop) => {
                info!(%run_id, stop_id = %stop.id, "stop completed");
            }
        }

        Ok(outcome)
    }

    /// [`complete_stop`](Self::complete_stop) inside the caller's
    /// transaction.
    pub fn complete_stop_in(
        &self,
        tx: &mut dyn DispatchTransaction,
        driver_id: DriverId,
        run_id: RunId,
        stop_id: StopId,
    ) -> Result<StopCompletion, DispatchError> {
        let run = read_run(tx, run_id)?;
        if run.driver_id != driver_id {
            return Err(DispatchError::Forbidden { driver_id, run_id });
        }
        if run.status != RunStatus::InProgress {
            return Err(DispatchError::InvalidRunState {
                run_id,
                status: run.status,
            });
        }
        let stop = run
            .stop(stop_id)
            .ok_or(DispatchError::StopNotFound { run_id, stop_id })?;
        if !stop.is_pending() {
            return Err(DispatchError::InvalidStopState {
                stop_id,
                status: stop.status,
            });
        }
        let order_id = stop.order_id;

        tx.update_stop_status(stop_id, StopStatus::Completed, Some(self.clock.now()))?;
        tx.update_order_statuses(&[order_id], OrderStatus::Completed)?;

        let updated = read_run(tx, run_id)?;
        if updated.all_stops_completed() {
            tx.update_run_status(run_id, RunStatus::Finished)?;
            return Ok(StopCompletion::RunFinished(read_run(tx, run_id)?));
        }

        updated
            .stop(stop_id)
            .cloned()
            .map(StopCompletion::StopCompleted)
            .ok_or(DispatchError::StopNotFound { run_id, stop_id })
    }

    pub fn find_run(&self, run_id: RunId) -> Result<Run, DispatchError> {
        self.store
            .find_run(run_id)?
            .ok_or(DispatchError::RunNotFound(run_id))
    }

    /// Runs matching `filter`; without dates, the current business day.
    pub fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, DispatchError> {
        let window = filter.window(
            self.clock.now(),
            self.config.day_rollover_hour,
            self.utc_offset()?,
        )?;
        Ok(self.store.find_runs(filter.driver_id, &window)?)
    }

    fn utc_offset(&self) -> Result<FixedOffset, DispatchError> {
        self.config.utc_offset().ok_or_else(|| {
            DispatchError::Validation(format!(
                "utc offset {}h is out of range",
                self.config.utc_offset_hours
            ))
        })
    }

    fn require_active_driver(&self, driver_id: DriverId) -> Result<(), DispatchError> {
        if self.store.find_active_driver(driver_id)?.is_some() {
            return Ok(());
        }
        match self.store.find_driver(driver_id)? {
            Some(_) => Err(DispatchError::InactiveDriver(driver_id)),
            None => Err(DispatchError::DriverNotFound(driver_id)),
        }
    }
}

fn validate_order_ids(order_ids: &[OrderId]) -> Result<(), DispatchError> {
    if order_ids.is_empty() {
        return Err(DispatchError::Validation(
            "at least one order is required".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(order_ids.len());
    for id in order_ids {
        if id.is_depot() {
            return Err(DispatchError::Validation(
                "order id 0 is reserved for the depot".to_string(),
            ));
        }
        if !seen.insert(*id) {
            return Err(DispatchError::Validation(format!(
                "order {id} is listed more than once"
            )));
        }
    }
    Ok(())
}

/// Every requested order must exist and still be awaiting a route.
fn check_orders(order_ids: &[OrderId], orders: &[Order]) -> Result<(), DispatchError> {
    let found: HashSet<OrderId> = orders.iter().map(|order| order.id).collect();
    let missing: Vec<OrderId> = order_ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::OrderNotFound(missing));
    }

    if let Some(order) = orders
        .iter()
        .find(|order| order.status != OrderStatus::AwaitingRoute)
    {
        return Err(DispatchError::InvalidOrderState {
            order_id: order.id,
            status: order.status,
        });
    }
    Ok(())
}

fn read_run(tx: &mut dyn DispatchTransaction, run_id: RunId) -> Result<Run, DispatchError> {
    tx.read_run_with_stops(run_id)?
        .ok_or(DispatchError::RunNotFound(run_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::Location;

    fn order(id: i64, status: OrderStatus) -> Order {
        Order {
            id: OrderId(id),
            location: Location::new(0.0, 0.0),
            deadline: None,
            status,
            customer_name: None,
            address: None,
        }
    }

    #[test]
    fn order_ids_must_be_present_and_unique() {
        assert!(validate_order_ids(&[]).is_err());
        assert!(validate_order_ids(&[OrderId(0)]).is_err());
        assert!(validate_order_ids(&[OrderId(1), OrderId(1)]).is_err());
        assert!(validate_order_ids(&[OrderId(1), OrderId(2)]).is_ok());
    }

    #[test]
    fn missing_orders_are_listed() {
        let err = check_orders(
            &[OrderId(1), OrderId(2), OrderId(3)],
            &[order(2, OrderStatus::AwaitingRoute)],
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::OrderNotFound(ids) if ids == vec![OrderId(1), OrderId(3)]));
    }

    #[test]
    fn orders_must_await_route() {
        let err = check_orders(
            &[OrderId(1), OrderId(2)],
            &[order(1, OrderStatus::AwaitingRoute), order(2, OrderStatus::InRoute)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidOrderState { order_id: OrderId(2), status: OrderStatus::InRoute }
        ));
    }
}
