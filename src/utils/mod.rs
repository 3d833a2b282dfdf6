//! Utility modules

pub mod error;
pub mod resp;

pub use error::{
    ClusterError, ConnectionError, Interrupted, ProbeError, ProtocolError, RequestError, Result,
};
pub use resp::{RespDecoder, RespEncoder, RespValue};
