//! Persistent storage for the broker.  Only the optional configuration file.

pub mod config;

pub use config::{load_config, parse_config, ConfigError, FileConfig};
