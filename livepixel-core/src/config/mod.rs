//! Configuration loading and parsing
//!
//! Configuration is a small TOML file embedded in the firmware image and
//! parsed at boot by a custom `no_std` parser.

pub mod toml;
pub mod types;

pub use toml::{parse_config, ConfigError};
pub use types::*;
