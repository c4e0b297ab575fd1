//! # komori-core
//!
//! Shared types for the komori service wrapper: supervision configuration,
//! interpreter mapping, on-disk service definitions, and path resolution.

pub mod config;
pub mod interpreters;
pub mod paths;
pub mod types;

pub use config::{ConfigError, ServiceDefinition};
pub use interpreters::{default_interpreters, merged_interpreters, InterpreterEntry};
pub use types::{ExitOutcome, SupervisionConfig, SupervisorState};
