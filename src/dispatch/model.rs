//! Dispatch entities: orders, drivers, runs and their stops.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::waypoint::OrderId;
use crate::waypoint::{Location, Waypoint};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(DriverId);
entity_id!(RunId);
entity_id!(StopId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    AwaitingRoute,
    InRoute,
    Completed,
}

/// An order as seen by dispatch. Owned by the order service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub location: Location,
    pub deadline: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub address: Option<String>,
}

impl Order {
    pub fn waypoint(&self) -> Waypoint {
        Waypoint::new(self.id, self.location, self.deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub status: DriverStatus,
}

impl Driver {
    pub fn is_active(&self) -> bool {
        self.status == DriverStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub run_id: RunId,
    pub order_id: OrderId,
    /// 1-based position among the run's stops.
    pub sequence_number: u32,
    pub status: StopStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Stop {
    pub fn is_pending(&self) -> bool {
        self.status == StopStatus::Pending
    }
}

/// A stop to be created with its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStop {
    pub order_id: OrderId,
    pub sequence_number: u32,
}

impl NewStop {
    /// Numbers `orders` 1..=N in the given order.
    pub fn sequence(orders: impl IntoIterator<Item = OrderId>) -> Vec<Self> {
        orders
            .into_iter()
            .zip(1u32..)
            .map(|(order_id, sequence_number)| Self {
                order_id,
                sequence_number,
            })
            .collect()
    }
}

/// A driver's delivery run with its stops ordered by sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub driver_id: DriverId,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub stops: Vec<Stop>,
}

impl Run {
    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|stop| stop.id == id)
    }

    pub fn all_stops_completed(&self) -> bool {
        self.stops.iter().all(|stop| stop.status == StopStatus::Completed)
    }

    pub fn pending_count(&self) -> usize {
        self.stops.iter().filter(|stop| stop.is_pending()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.status == RunStatus::Finished
    }
}

/// Route figures returned alongside a newly created run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDetails {
    pub total_distance_meters: f64,
    pub total_duration_minutes: f64,
    /// Order ids in visiting order.
    pub optimized_sequence: Vec<OrderId>,
    /// Orders the route could not reach; they have no stop in the run.
    pub unrouted_order_ids: Vec<OrderId>,
}

/// An optimized route for a driver, not yet written to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedRun {
    pub driver_id: DriverId,
    /// Every requested order, routed or not.
    pub order_ids: Vec<OrderId>,
    pub stops: Vec<NewStop>,
    pub route: RouteDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedRun {
    pub run: Run,
    pub route: RouteDetails,
}

/// Result of completing a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum StopCompletion {
    /// Other stops are still pending.
    StopCompleted(Stop),
    /// That was the last pending stop; the run is now finished.
    RunFinished(Run),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stops_are_numbered_from_one() {
        let stops = NewStop::sequence([OrderId(9), OrderId(4), OrderId(7)]);
        let numbers: Vec<_> = stops.iter().map(|s| (s.order_id.0, s.sequence_number)).collect();
        assert_eq!(numbers, vec![(9, 1), (4, 2), (7, 3)]);
    }

    #[test]
    fn statuses_serialize_screaming() {
        assert_eq!(serde_json::to_string(&OrderStatus::AwaitingRoute).unwrap(), "\"AWAITING_ROUTE\"");
        assert_eq!(serde_json::to_string(&RunStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
    }
}
