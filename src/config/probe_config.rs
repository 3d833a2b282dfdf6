//! Probe configuration derived from CLI arguments

use std::time::Duration;

use super::cli::{CliArgs, OutputFormat};
use crate::client::ConnectionFactory;
use crate::cluster::{Credentials, FanoutConfig, NodeAddress};
use crate::utils::{ProbeError, Result};

/// Complete probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    // Connection
    pub seeds: Vec<NodeAddress>,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,

    // Discovery
    pub timeout: Duration,
    pub discover: bool,

    // Output
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
}

impl ProbeConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        args.validate().map_err(ProbeError::Config)?;

        let credentials = args.password.as_ref().map(|p| Credentials {
            username: args.username.clone(),
            password: p.clone(),
        });

        let mut seeds = args
            .hosts
            .iter()
            .map(|h| {
                NodeAddress::parse_with_default(h, args.port)
                    .map(|a| a.with_credentials(credentials.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        seeds.sort();
        seeds.dedup();

        Ok(Self {
            seeds,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            io_timeout: Duration::from_millis(args.io_timeout_ms),
            timeout: Duration::from_millis(args.timeout_ms),
            discover: !args.no_discovery,
            output_format: args.output_format,
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }

    pub fn connection_factory(&self) -> ConnectionFactory {
        ConnectionFactory {
            connect_timeout: self.connect_timeout,
            read_timeout: self.io_timeout,
            write_timeout: self.io_timeout,
        }
    }

    pub fn fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            timeout: self.timeout,
            discover: self.discover,
        }
    }
}
