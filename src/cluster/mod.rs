//! Cluster topology fan-out
//!
//! This module provides:
//! - Node addresses with a deterministic total order
//! - Timed per-node requests over an abstract pending reply
//! - Request batches awaited under one shared deadline, and their merge
//! - CLUSTER NODES decoding
//! - A thread-per-node dispatcher and a seed/discovery driver

pub mod address;
pub mod decode;
pub mod dispatch;
pub mod fanout;
pub mod node;
pub mod pending;
pub mod request_batch;
pub mod timed_request;

pub use address::{compare_addresses, Credentials, NodeAddress, DEFAULT_PORT};
pub use decode::{ClusterNodesDecoder, LineListDecoder, TopologyDecoder};
pub use dispatch::{Dispatcher, RawReply, ThreadDispatcher};
pub use fanout::{FanoutConfig, TopologyFanout, TopologyViews};
pub use node::{parse_cluster_node_line, ClusterNode, SlotRange};
pub use pending::{reply_channel, Interrupt, PendingReply, ReplySender, ReplySlot};
pub use request_batch::{NodeReport, RequestBatch};
pub use timed_request::{TimedRequest, WaitOutcome};
