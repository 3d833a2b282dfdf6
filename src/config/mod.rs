//! Configuration module

pub mod cli;
pub mod probe_config;

pub use cli::{CliArgs, OutputFormat};
pub use probe_config::ProbeConfig;
