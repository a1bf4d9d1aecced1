//! Run dispatch: turning awaiting orders into a driver's run and tracking
//! the run until its last stop is delivered.

pub mod error;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod window;

pub use error::DispatchError;
pub use memory::MemoryStore;
pub use model::{
    DispatchedRun, Driver, DriverId, DriverStatus, NewStop, Order, OrderId, OrderStatus,
    PlannedRun, RouteDetails, Run, RunId, RunStatus, Stop, StopCompletion, StopId, StopStatus,
};
pub use orchestrator::DispatchOrchestrator;
pub use store::{DispatchStore, DispatchTransaction, RunWindow, StoreError};
pub use window::{business_day_window, RunFilter};
