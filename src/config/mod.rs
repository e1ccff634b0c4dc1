pub mod loader;

pub use loader::{load_config, load_or_default, parse_config, validate_config, ConfigSource};
