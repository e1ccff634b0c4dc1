pub mod types;
pub mod error;
pub mod config;
pub mod time;
pub mod data;
pub mod events;
pub mod clients;
pub mod store;
pub mod feed;
pub mod discovery;
pub mod polling;
pub mod service;
pub mod utils;

pub use types::*;
pub use error::{EngineError, Result};
