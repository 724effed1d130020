//! Validator process: TOML configuration and a local committee runtime.
//!
//! The binary in `src/bin/validator.rs` loads a [`ValidatorConfig`], installs
//! logging and drives a [`ValidatorRuntime`] until interrupted.

pub mod config;
pub mod runtime;

pub use config::{ConfigError, GenesisCoin, GenesisConfig, GenesisCounter, NodeConfig, ValidatorConfig};
pub use runtime::{RunStats, RuntimeError, ValidatorRuntime};
