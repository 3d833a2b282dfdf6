//! Node addresses and their deterministic ordering

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::utils::ClusterError;

/// Default Valkey/Redis port, used when an address omits one
pub const DEFAULT_PORT: u16 = 6379;

/// Credentials presented to a node on connect
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Network identity of one cluster member
///
/// Immutable once built. Identity is host and port: two addresses naming the
/// same endpoint are equal whatever credentials they carry. Ordering is
/// [`compare_addresses`].
#[derive(Debug, Clone)]
pub struct NodeAddress {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    /// Same node, presenting the given credentials
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Parse `host`, `host:port` or `[ipv6]:port`, filling in `default_port`
    pub fn parse_with_default(s: &str, default_port: u16) -> Result<Self, ClusterError> {
        let s = s.trim();
        let invalid = || ClusterError::InvalidAddress(s.to_string());

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail {
                "" => default_port,
                _ => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            if host.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::new(host, port));
        }

        // A bare IPv6 literal has more than one colon and no port
        let (host, port) = match s.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => (s, default_port),
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (s, default_port),
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for NodeAddress {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, DEFAULT_PORT)
    }
}

/// Total order over node addresses
///
/// Host compares lexically, then port numerically. Credentials take no part.
pub fn compare_addresses(a: &NodeAddress, b: &NodeAddress) -> Ordering {
    a.host.cmp(&b.host).then(a.port.cmp(&b.port))
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        compare_addresses(self, other) == Ordering::Equal
    }
}

impl Eq for NodeAddress {}

impl Hash for NodeAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl Ord for NodeAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_addresses(self, other)
    }
}

impl PartialOrd for NodeAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(password: &str) -> Option<Credentials> {
        Some(Credentials {
            username: None,
            password: password.to_string(),
        })
    }

    #[test]
    fn test_host_then_port_order() {
        let mut nodes = vec![
            NodeAddress::new("10.0.0.2", 7000),
            NodeAddress::new("10.0.0.1", 7002),
            NodeAddress::new("10.0.0.1", 7001),
        ];
        nodes.sort();
        let rendered: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.1:7001", "10.0.0.1:7002", "10.0.0.2:7000"]);
    }

    #[test]
    fn test_port_is_numeric_not_lexical() {
        let low = NodeAddress::new("node", 900);
        let high = NodeAddress::new("node", 10000);
        assert_eq!(compare_addresses(&low, &high), Ordering::Less);
    }

    #[test]
    fn test_credentials_do_not_affect_identity() {
        let a = NodeAddress::new("a", 9000).with_credentials(creds("zzz"));
        let b = NodeAddress::new("b", 1);
        assert_eq!(compare_addresses(&a, &b), Ordering::Less);

        let plain = NodeAddress::new("a", 9000);
        let other = NodeAddress::new("a", 9000).with_credentials(creds("aaa"));
        assert_eq!(compare_addresses(&plain, &a), Ordering::Equal);
        assert_eq!(compare_addresses(&a, &other), Ordering::Equal);
        assert_eq!(plain, a);
        assert_eq!(a, other);

        let mut set = std::collections::HashSet::new();
        set.insert(plain);
        assert!(!set.insert(other));
    }

    #[test]
    fn test_sort_is_independent_of_input_order() {
        let a = NodeAddress::new("127.0.0.1", 30001);
        let b = NodeAddress::new("127.0.0.1", 30002);
        let c = NodeAddress::new("127.0.0.2", 30000);

        let mut forward = vec![a.clone(), b.clone(), c.clone()];
        let mut backward = vec![c, b, a];
        forward.sort();
        backward.sort();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_parse_forms() {
        let addr: NodeAddress = "127.0.0.1:7001".parse().unwrap();
        assert_eq!((addr.host(), addr.port()), ("127.0.0.1", 7001));

        let addr: NodeAddress = "cache.internal".parse().unwrap();
        assert_eq!((addr.host(), addr.port()), ("cache.internal", DEFAULT_PORT));

        let addr: NodeAddress = "[::1]:6380".parse().unwrap();
        assert_eq!((addr.host(), addr.port()), ("::1", 6380));
        assert_eq!(addr.to_string(), "[::1]:6380");

        let addr: NodeAddress = "fe80::1".parse().unwrap();
        assert_eq!((addr.host(), addr.port()), ("fe80::1", DEFAULT_PORT));

        let addr = NodeAddress::parse_with_default("node-1", 7000).unwrap();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("host:notaport".parse::<NodeAddress>().is_err());
        assert!(":6379".parse::<NodeAddress>().is_err());
        assert!("[::1".parse::<NodeAddress>().is_err());
        assert!("[]:6379".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let addr = NodeAddress::new("a", 1).with_credentials(creds("hunter2"));
        let debug = format!("{:?}", addr);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
