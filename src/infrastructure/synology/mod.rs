//! Synology DSM FileStation Web API client

pub mod client;
pub mod error;

pub use client::{CopyOutcome, FileStationClient};
pub use error::SynologyError;
