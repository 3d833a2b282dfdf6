//! valkey-topology-probe library
//!
//! Cluster topology fan-out for Valkey/Redis cluster clients: ask every
//! known node for its view of the cluster at once, wait for the answers
//! under a single shared deadline, and hand back whatever arrived in a
//! deterministic node order.

pub mod client;
pub mod cluster;
pub mod config;
pub mod utils;
