//! cmdrun core - platform-independent types for managed subprocesses
//!
//! This crate provides the configuration, state, logger and error types
//! shared by the platform-specific runner implementations.

mod config;
mod error;
mod process;

pub use config::*;
pub use error::*;
pub use process::*;
