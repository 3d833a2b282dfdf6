//! Cluster node entries as reported by CLUSTER NODES

use super::address::NodeAddress;
use crate::utils::ClusterError;

/// Inclusive range of hash slots served by a primary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn count(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn contains(&self, slot: u16) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

/// One line of a CLUSTER NODES report, as seen by the reporting node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    /// Node ID
    pub id: String,
    /// Client-facing address
    pub address: NodeAddress,
    /// Cluster bus port (0 when not reported)
    pub bus_port: u16,
    /// Announced hostname, if any
    pub hostname: Option<String>,
    /// Raw flags (myself, master, slave, fail?, fail, handshake, noaddr, ...)
    pub flags: Vec<String>,
    /// Primary node ID (replicas only)
    pub primary_id: Option<String>,
    pub ping_sent: u64,
    pub pong_received: u64,
    pub config_epoch: u64,
    /// Link to this node is up
    pub connected: bool,
    /// Owned slots (primaries only); importing/migrating markers are skipped
    pub slots: Vec<SlotRange>,
}

impl ClusterNode {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_primary(&self) -> bool {
        self.has_flag("master")
    }

    pub fn is_replica(&self) -> bool {
        self.has_flag("slave") || self.has_flag("replica")
    }

    /// The reporting node itself
    pub fn is_myself(&self) -> bool {
        self.has_flag("myself")
    }

    /// Up, linked, and not in handshake or without an address
    pub fn is_available(&self) -> bool {
        self.connected
            && !self
                .flags
                .iter()
                .any(|f| matches!(f.as_str(), "fail" | "fail?" | "handshake" | "noaddr"))
    }

    pub fn slot_count(&self) -> usize {
        self.slots.iter().map(SlotRange::count).sum()
    }
}

/// Parse a line from a CLUSTER NODES reply
///
/// Format: `<id> <ip:port@cport[,hostname]> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> ...`
pub fn parse_cluster_node_line(line: &str) -> Result<ClusterNode, ClusterError> {
    let parse_failed = || ClusterError::ParseFailed(line.to_string());

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return Err(parse_failed());
    }

    let (address, bus_port, hostname) = parse_node_address(parts[1]).ok_or_else(parse_failed)?;
    let flags: Vec<String> = parts[2].split(',').map(String::from).collect();
    let primary_id = match parts[3] {
        "-" => None,
        id => Some(id.to_string()),
    };
    let number = |s: &str| s.parse::<u64>().map_err(|_| parse_failed());

    let mut node = ClusterNode {
        id: parts[0].to_string(),
        address,
        bus_port,
        hostname,
        flags,
        primary_id,
        ping_sent: number(parts[4])?,
        pong_received: number(parts[5])?,
        config_epoch: number(parts[6])?,
        connected: parts[7] == "connected",
        slots: Vec::new(),
    };

    if node.is_primary() {
        node.slots = parts[8..].iter().filter_map(|s| parse_slot_range(s)).collect();
    }
    Ok(node)
}

/// Parse `host:port@cport[,hostname]`; the bus port and hostname are optional
fn parse_node_address(addr: &str) -> Option<(NodeAddress, u16, Option<String>)> {
    let (addr, hostname) = match addr.split_once(',') {
        Some((addr, name)) if !name.is_empty() => (addr, Some(name.to_string())),
        Some((addr, _)) => (addr, None),
        None => (addr, None),
    };

    let (host_port, bus_port) = match addr.split_once('@') {
        Some((hp, cport)) => (hp, cport.parse().ok()?),
        None => (addr, 0),
    };

    let (host, port) = host_port.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port: u16 = port.parse().ok()?;

    Some((NodeAddress::new(host, port), bus_port, hostname))
}

/// Parse slot range: "0-5460" or "0"
fn parse_slot_range(s: &str) -> Option<SlotRange> {
    // Skip importing/migrating markers like "[123->-node_id]"
    if s.starts_with('[') {
        return None;
    }

    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (start.parse().ok()?, end.parse().ok()?),
        None => {
            let slot = s.parse().ok()?;
            (slot, slot)
        }
    };
    (start <= end).then_some(SlotRange { start, end })
}
