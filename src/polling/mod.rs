pub mod coordinator;

pub use coordinator::{CycleReport, PollingCoordinator};
