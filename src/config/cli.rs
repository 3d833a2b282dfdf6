//! Command-line argument parsing

use clap::{Parser, ValueEnum};

/// Query cluster topology from seed nodes under one shared deadline
#[derive(Parser, Debug, Clone)]
#[command(name = "valkey-topology-probe")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help information
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,

    // ===== Connection Options =====
    /// Seed node, as host or host:port (repeatable)
    #[arg(short = 'h', long = "host", default_value = "127.0.0.1", action = clap::ArgAction::Append)]
    pub hosts: Vec<String>,

    /// Port for seeds given without one
    #[arg(short = 'p', long = "port", default_value_t = 6379)]
    pub port: u16,

    /// Password for AUTH command
    #[arg(short = 'a', long = "auth")]
    pub password: Option<String>,

    /// Username for ACL AUTH (requires --auth)
    #[arg(long = "user")]
    pub username: Option<String>,

    // ===== Timing Options =====
    /// Total wait budget for all nodes, in milliseconds
    #[arg(long = "timeout", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Connection timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Socket read/write timeout in milliseconds
    #[arg(long = "io-timeout", default_value_t = 30000)]
    pub io_timeout_ms: u64,

    // ===== Discovery Options =====
    /// Only query the given seeds, not the nodes they announce
    #[arg(long = "no-discovery")]
    pub no_discovery: bool,

    // ===== Output Options =====
    /// Output format
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Report output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One line per node
    #[default]
    Text,
    /// One JSON document
    Json,
}

impl CliArgs {
    /// Parse arguments from the process command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_some() && self.password.is_none() {
            return Err("--user requires --auth".to_string());
        }
        if self.hosts.is_empty() {
            return Err("At least one --host is required".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("--connect-timeout must be greater than 0".to_string());
        }
        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("valkey-topology-probe").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.hosts, vec!["127.0.0.1"]);
        assert_eq!(args.port, 6379);
        assert_eq!(args.timeout_ms, 5000);
        assert!(!args.no_discovery);
        assert_eq!(args.output_format, OutputFormat::Text);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_multiple_hosts() {
        let args = parse(&["-h", "10.0.0.1:7000", "-h", "10.0.0.2", "-p", "7001"]);
        assert_eq!(args.hosts, vec!["10.0.0.1:7000", "10.0.0.2"]);
        assert_eq!(args.port, 7001);
    }

    #[test]
    fn test_user_requires_auth() {
        let args = parse(&["--user", "probe"]);
        assert!(args.validate().is_err());

        let args = parse(&["--user", "probe", "-a", "secret"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_json_output() {
        let args = parse(&["--output-format", "json", "--timeout", "250", "--no-discovery"]);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.timeout_ms, 250);
        assert!(args.no_discovery);
    }
}
