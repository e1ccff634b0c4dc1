pub mod lifecycle_gate;

pub use lifecycle_gate::{Discovery, GateOutcome, TokenLifecycleGate};
