//! Test fixtures for dispatch-planner.
//!
//! Provides realistic test data including:
//! - Delivery addresses around Londrina, PR (from OpenStreetMap)
//! - Builders for orders, drivers and seeded stores

#![allow(dead_code)]

pub mod londrina_locations;

use chrono::{DateTime, TimeZone, Utc};

use dispatch_planner::dispatch::{Driver, DriverId, DriverStatus, MemoryStore, Order, OrderId, OrderStatus};
use dispatch_planner::waypoint::Location;

pub use londrina_locations::*;

/// Monday afternoon in Londrina, well inside a business day.
pub fn monday_afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 17, 0, 0).unwrap()
}

pub fn awaiting_order(id: i64, place: &NamedPlace) -> Order {
    Order {
        id: OrderId(id),
        location: place.location(),
        deadline: None,
        status: OrderStatus::AwaitingRoute,
        customer_name: Some(format!("Customer {id}")),
        address: Some(place.name.to_string()),
    }
}

pub fn driver(id: i64, status: DriverStatus) -> Driver {
    Driver {
        id: DriverId(id),
        name: format!("Driver {id}"),
        status,
    }
}

/// A store with active driver 1, inactive driver 2 and one awaiting order
/// per place, numbered from 1.
pub fn seeded_store(places: &[NamedPlace]) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_driver(driver(1, DriverStatus::Active)).unwrap();
    store.insert_driver(driver(2, DriverStatus::Inactive)).unwrap();
    for (i, place) in places.iter().enumerate() {
        store.insert_order(awaiting_order(i as i64 + 1, place)).unwrap();
    }
    store
}

pub fn order_ids(count: usize) -> Vec<OrderId> {
    (1..=count as i64).map(OrderId).collect()
}

pub fn location(lat: f64, lng: f64) -> Location {
    Location::new(lat, lng)
}
