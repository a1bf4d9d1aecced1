//! Normalized optimizer input: a depot plus the order locations to visit.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a delivery order. `0` is reserved for the depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub const DEPOT: OrderId = OrderId(0);

    pub fn is_depot(self) -> bool {
        self == Self::DEPOT
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for Location {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// A node in the routing graph: the depot or one order's drop-off point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub order_id: OrderId,
    pub location: Location,
    /// Latest acceptable delivery time, if the order has one.
    pub deadline: Option<DateTime<Utc>>,
}

impl Waypoint {
    pub fn new(order_id: OrderId, location: Location, deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            order_id,
            location,
            deadline,
        }
    }

    pub fn depot(location: Location) -> Self {
        Self::new(OrderId::DEPOT, location, None)
    }

    pub fn is_depot(&self) -> bool {
        self.order_id.is_depot()
    }

    /// True when the deadline is strictly before `now`.
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline < now)
    }
}

/// Errors returned by [`WaypointSet::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaypointError {
    #[error("at least one order waypoint is required")]
    NoStops,
    #[error("order id 0 is reserved for the depot")]
    DepotIdReserved,
    #[error("order {0} appears more than once")]
    DuplicateOrder(OrderId),
    #[error("order {order_id} has an invalid coordinate")]
    InvalidCoordinate { order_id: OrderId },
}

/// Depot at index 0 followed by the order waypoints in input order.
///
/// The closing return to the depot is not stored; the optimizer appends it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaypointSet {
    waypoints: Vec<Waypoint>,
}

impl WaypointSet {
    pub fn new<I>(depot: Location, stops: I) -> Result<Self, WaypointError>
    where
        I: IntoIterator<Item = Waypoint>,
    {
        if !depot.is_valid() {
            return Err(WaypointError::InvalidCoordinate {
                order_id: OrderId::DEPOT,
            });
        }

        let mut waypoints = vec![Waypoint::depot(depot)];
        let mut seen = HashSet::new();
        for stop in stops {
            if stop.is_depot() {
                return Err(WaypointError::DepotIdReserved);
            }
            if !stop.location.is_valid() {
                return Err(WaypointError::InvalidCoordinate {
                    order_id: stop.order_id,
                });
            }
            if !seen.insert(stop.order_id) {
                return Err(WaypointError::DuplicateOrder(stop.order_id));
            }
            waypoints.push(stop);
        }

        if waypoints.len() < 2 {
            return Err(WaypointError::NoStops);
        }

        Ok(Self { waypoints })
    }

    pub fn depot(&self) -> &Waypoint {
        &self.waypoints[0]
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Number of waypoints including the depot.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always false: a set holds the depot and at least one stop.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn stop_count(&self) -> usize {
        self.waypoints.len() - 1
    }

    pub fn as_slice(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Coordinates in index order, as sent to a distance provider.
    pub fn locations(&self) -> Vec<Location> {
        self.waypoints.iter().map(|w| w.location).collect()
    }

    pub fn order_id_at(&self, index: usize) -> Option<OrderId> {
        self.waypoints.get(index).map(|w| w.order_id)
    }
}
