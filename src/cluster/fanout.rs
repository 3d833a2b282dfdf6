//! Topology discovery across seed nodes
//!
//! Sends CLUSTER NODES to every seed at once and waits for the replies under
//! one shared budget. With discovery enabled, nodes that the seeds announce
//! but that were not seeds themselves are asked too, with whatever budget
//! the seed round left over, and that round is merged over the seed round.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::address::NodeAddress;
use super::decode::{ClusterNodesDecoder, TopologyDecoder};
use super::dispatch::Dispatcher;
use super::pending::{Interrupt, PendingReply};
use super::request_batch::{NodeReport, RequestBatch};
use crate::utils::{Interrupted, RespEncoder};

/// Discovery settings
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Budget shared by all waits of one discovery run
    pub timeout: Duration,
    /// Also query nodes announced by seeds
    pub discover: bool,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            discover: true,
        }
    }
}

/// Raw per-node topology replies from one discovery run
pub struct TopologyViews<P> {
    pub batch: RequestBatch<P>,
    /// Time spent waiting across all rounds
    pub elapsed: Duration,
}

impl<P> TopologyViews<P>
where
    P: PendingReply<Output = Vec<u8>>,
    P::Error: fmt::Display,
{
    /// Decode every node's reply; request and decode failures become text
    pub fn decode_with<D: TopologyDecoder>(
        &self,
        decoder: &D,
    ) -> Vec<(NodeAddress, NodeReport<D::Report, String>)> {
        self.batch
            .reports()
            .into_iter()
            .map(|(node, report)| {
                let decoded = match report {
                    NodeReport::NoData => NodeReport::NoData,
                    NodeReport::Failed(e) => NodeReport::Failed(e.to_string()),
                    NodeReport::Report(raw) => match decoder.decode(&raw) {
                        Ok(report) => NodeReport::Report(report),
                        Err(e) => NodeReport::Failed(e.to_string()),
                    },
                };
                (node, decoded)
            })
            .collect()
    }

    /// Number of nodes that replied successfully
    pub fn reported(&self) -> usize {
        self.batch
            .reports()
            .iter()
            .filter(|(_, report)| report.is_report())
            .count()
    }
}

/// Runs topology discovery through a [`Dispatcher`]
pub struct TopologyFanout<D> {
    dispatcher: D,
    config: FanoutConfig,
    payload: Arc<[u8]>,
}

impl<D> TopologyFanout<D>
where
    D: Dispatcher,
    D::Pending: PendingReply<Output = Vec<u8>>,
{
    pub fn new(dispatcher: D, config: FanoutConfig) -> Self {
        let payload = RespEncoder::command(&["CLUSTER", "NODES"]).into_bytes().into();
        Self {
            dispatcher,
            config,
            payload,
        }
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Send CLUSTER NODES to every node, without waiting
    pub fn request_topology<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a NodeAddress>,
    ) -> RequestBatch<D::Pending> {
        nodes
            .into_iter()
            .map(|node| (node.clone(), self.dispatcher.dispatch(node, &self.payload)))
            .collect()
    }

    /// Query the seeds, then optionally the nodes they announce
    pub fn load_views(
        &self,
        seeds: &[NodeAddress],
        interrupt: &Interrupt,
    ) -> Result<TopologyViews<D::Pending>, Interrupted> {
        let mut batch = self.request_topology(seeds);
        let mut elapsed = batch.await_all(self.config.timeout, interrupt)?;
        debug!(
            "Seed round: {} of {} nodes replied in {:?}",
            count_reports(&batch),
            batch.len(),
            elapsed
        );

        if self.config.discover {
            let discovered = discovered_nodes(&batch);
            if !discovered.is_empty() {
                info!("Querying {} additional announced nodes", discovered.len());
                let additional = self.request_topology(&discovered);
                let remaining = self.config.timeout.saturating_sub(elapsed);
                elapsed += additional.await_all(remaining, interrupt)?;
                batch = batch.merge_with(&additional);
            }
        }

        info!(
            "Topology views loaded: {} of {} nodes replied in {:?}",
            count_reports(&batch),
            batch.len(),
            elapsed
        );
        Ok(TopologyViews { batch, elapsed })
    }
}

fn count_reports<P: PendingReply>(batch: &RequestBatch<P>) -> usize {
    batch.nodes().filter(|node| batch.report_for(node).is_report()).count()
}

/// Available nodes announced in replies that are not yet in `batch`
///
/// Announced nodes inherit the credentials of the first seed.
fn discovered_nodes<P>(batch: &RequestBatch<P>) -> Vec<NodeAddress>
where
    P: PendingReply<Output = Vec<u8>>,
{
    let credentials = batch.nodes().next().and_then(|seed| seed.credentials().cloned());
    let mut found: Vec<NodeAddress> = Vec::new();

    for (node, report) in batch.reports() {
        let NodeReport::Report(raw) = report else {
            continue;
        };
        let nodes = match ClusterNodesDecoder.decode(&raw) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Ignoring undecodable topology from {}: {}", node, e);
                continue;
            }
        };

        for announced in nodes.into_iter().filter(|n| n.is_available()) {
            if announced.address.host().is_empty() {
                continue;
            }
            let address = announced.address.with_credentials(credentials.clone());
            if !batch.contains(&address) && !found.contains(&address) {
                found.push(address);
            }
        }
    }

    found.sort();
    found
}
