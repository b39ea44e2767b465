//! # Configuration
//!
//! Client configuration: backend endpoints, session storage location, logging and
//! the timing constants that drive debounced validation and session checks.

pub mod client;

pub use client::{ClientConfig, ConfigError, ConfigFormat, LogFormat, LoggingConfig, TimingConfig};
