//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (user config, then project config)
//! - `.env` loading through dotenvy
//! - Raw credential variables (`OPENAI_API_KEY`, `NAS_*`, ...)
//! - `FSASSIST_*` overrides
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
