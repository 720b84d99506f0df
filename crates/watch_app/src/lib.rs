//! Portal watch application: configuration and wiring for the binaries.
mod config;
mod runtime;

pub use config::{ConfigError, Settings};
pub use runtime::{build_orchestrator, start, PortalOrchestrator};
