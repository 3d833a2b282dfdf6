//! Per-node request batches awaited under one shared deadline
//!
//! A [`RequestBatch`] maps each node to the request sent to it and always
//! walks those nodes in address order. [`RequestBatch::await_all`] spends a
//! single timeout budget across the batch sequentially: each node gets
//! whatever is left after the nodes before it, and the walk stops at the
//! first node that does not answer within its slice. Nodes past that point
//! are not waited on but keep running; a later wait or a follow-up batch
//! can still pick them up.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::address::NodeAddress;
use super::pending::{Interrupt, PendingReply};
use super::timed_request::{TimedRequest, WaitOutcome};
use crate::utils::Interrupted;

/// What the resolution layer sees for one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeReport<T, E> {
    /// Not in the batch, or no reply yet
    NoData,
    /// Reply arrived
    Report(T),
    /// Request completed with a failure
    Failed(E),
}

impl<T, E> NodeReport<T, E> {
    pub fn is_report(&self) -> bool {
        matches!(self, NodeReport::Report(_))
    }

    pub fn as_report(&self) -> Option<&T> {
        match self {
            NodeReport::Report(value) => Some(value),
            _ => None,
        }
    }
}

impl<T, E> From<Option<Result<T, E>>> for NodeReport<T, E> {
    fn from(outcome: Option<Result<T, E>>) -> Self {
        match outcome {
            None => NodeReport::NoData,
            Some(Ok(value)) => NodeReport::Report(value),
            Some(Err(e)) => NodeReport::Failed(e),
        }
    }
}

/// Requests keyed by node, iterated in address order
pub struct RequestBatch<P> {
    requests: BTreeMap<NodeAddress, Arc<TimedRequest<P>>>,
}

impl<P: PendingReply> RequestBatch<P> {
    pub fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
        }
    }

    /// Record the request sent to `node`, replacing any earlier one
    pub fn add_request(&mut self, node: NodeAddress, request: TimedRequest<P>) {
        self.insert_shared(node, Arc::new(request));
    }

    /// Record an already shared request handle
    ///
    /// A replaced entry takes the new key too, so the credentials stored
    /// for the node are those of the latest request.
    pub fn insert_shared(&mut self, node: NodeAddress, request: Arc<TimedRequest<P>>) {
        if self.requests.remove(&node).is_some() {
            trace!("Replaced pending request for {}", node);
        }
        self.requests.insert(node, request);
    }

    /// Wait for replies under one shared `timeout`, returning the time spent
    ///
    /// Nodes are visited in address order. Each wait gets the budget left
    /// over from earlier waits, and its wall time is charged whether or not
    /// the node answered. The walk stops once the budget is gone or a node
    /// fails to answer within its slice.
    ///
    /// Timeouts are not errors. Only a raised `interrupt` is, and it is
    /// returned immediately; the time spent up to that point is discarded.
    pub fn await_all(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<Duration, Interrupted> {
        let mut elapsed = Duration::ZERO;

        for (node, request) in &self.requests {
            let remaining = timeout.saturating_sub(elapsed);
            if remaining.is_zero() {
                debug!("Topology wait budget exhausted before {}", node);
                break;
            }

            let start = Instant::now();
            let outcome = request.bounded_wait(remaining, interrupt);
            elapsed += start.elapsed();

            if !outcome?.is_completed() {
                debug!(
                    "No reply from {} within {:?}, skipping remaining nodes",
                    node, remaining
                );
                break;
            }
            trace!("Reply from {} after {:?} total wait", node, elapsed);
        }

        Ok(elapsed)
    }

    /// Every node a request was added for, in address order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeAddress> {
        self.requests.keys()
    }

    pub fn request_for(&self, node: &NodeAddress) -> Option<&Arc<TimedRequest<P>>> {
        self.requests.get(node)
    }

    pub fn contains(&self, node: &NodeAddress) -> bool {
        self.requests.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Nodes whose reply has not arrived yet
    pub fn pending_nodes(&self) -> Vec<NodeAddress> {
        self.requests
            .iter()
            .filter(|(_, request)| !request.is_done())
            .map(|(node, _)| node.clone())
            .collect()
    }

    /// Current three-way outcome for `node`
    pub fn report_for(&self, node: &NodeAddress) -> NodeReport<P::Output, P::Error> {
        self.requests
            .get(node)
            .map_or(NodeReport::NoData, |request| request.outcome().into())
    }

    /// Outcome of every node, in address order
    pub fn reports(&self) -> Vec<(NodeAddress, NodeReport<P::Output, P::Error>)> {
        self.requests
            .iter()
            .map(|(node, request)| (node.clone(), request.outcome().into()))
            .collect()
    }

    /// Union of both batches; on a shared node the entry from `other` wins
    ///
    /// Neither batch is modified. Request handles are shared, not copied.
    pub fn merge_with(&self, other: &RequestBatch<P>) -> RequestBatch<P> {
        let mut merged = self.clone();
        for (node, request) in &other.requests {
            merged.insert_shared(node.clone(), Arc::clone(request));
        }
        merged
    }
}

impl<P: PendingReply> Default for RequestBatch<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for RequestBatch<P> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<P: PendingReply> FromIterator<(NodeAddress, TimedRequest<P>)> for RequestBatch<P> {
    fn from_iter<I: IntoIterator<Item = (NodeAddress, TimedRequest<P>)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (node, request) in iter {
            batch.add_request(node, request);
        }
        batch
    }
}
