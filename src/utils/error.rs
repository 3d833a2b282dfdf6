//! Error types for valkey-topology-probe

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid RESP type byte: {0:#04x}")]
    InvalidType(u8),

    #[error("Invalid {what} length: {value}")]
    InvalidLength { what: &'static str, value: String },

    #[error("Invalid integer reply: {0}")]
    InvalidInteger(String),

    #[error("Empty RESP line")]
    EmptyLine,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Cluster-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Failed to parse CLUSTER NODES line: {0}")]
    ParseFailed(String),

    #[error("Topology report is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid node address: {0}")]
    InvalidAddress(String),
}

/// Failure of a single node's request
///
/// Cloneable because the same outcome is read by every holder of the
/// request handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("server replied with error: {0}")]
    Server(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("request was dropped before a reply arrived")]
    Abandoned,
}

impl From<ConnectionError> for RequestError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::AuthFailed(msg) => RequestError::Auth(msg),
            other => RequestError::Connect(other.to_string()),
        }
    }
}

impl From<ProtocolError> for RequestError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(io) => RequestError::Io(io.to_string()),
            other => RequestError::Protocol(other.to_string()),
        }
    }
}

/// The waiting thread was asked to stop waiting
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("wait interrupted")]
pub struct Interrupted;

pub type Result<T> = std::result::Result<T, ProbeError>;
