//! Decoders from raw topology replies to structured reports
//!
//! The aggregation engine hands back raw bulk payloads; turning them into
//! something a resolver can compare happens here.

use super::node::{parse_cluster_node_line, ClusterNode};
use crate::utils::ClusterError;

/// Decodes one node's raw reply
pub trait TopologyDecoder {
    type Report;

    fn decode(&self, raw: &[u8]) -> Result<Self::Report, ClusterError>;
}

/// CLUSTER NODES text into one [`ClusterNode`] per line
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterNodesDecoder;

impl TopologyDecoder for ClusterNodesDecoder {
    type Report = Vec<ClusterNode>;

    fn decode(&self, raw: &[u8]) -> Result<Vec<ClusterNode>, ClusterError> {
        let text = std::str::from_utf8(raw).map_err(|_| ClusterError::InvalidUtf8)?;
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_cluster_node_line)
            .collect()
    }
}

/// Bulk text into its non-empty lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LineListDecoder;

impl TopologyDecoder for LineListDecoder {
    type Report = Vec<String>;

    fn decode(&self, raw: &[u8]) -> Result<Vec<String>, ClusterError> {
        let text = std::str::from_utf8(raw).map_err(|_| ClusterError::InvalidUtf8)?;
        Ok(text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}
