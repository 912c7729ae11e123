//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Console output on stderr (stdout carries the chat or JSON-RPC)
//! - Optional rolling log files
//! - Secret scrubbing on every formatted line
//! - JSON-lines audit trail

pub mod audit;
pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditOutcome};
pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::{ScrubbingMakeWriter, scrub_secrets};
