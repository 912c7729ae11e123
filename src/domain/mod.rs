//! Domain layer for the filesystem assistant
//!
//! This module contains the core models (configuration, chat messages, tool
//! descriptors) and the port traits that infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ToolError};
