//! Sending one request per node
//!
//! A [`Dispatcher`] turns "send this payload to that node" into a
//! [`TimedRequest`] the caller can put in a [`RequestBatch`]. The request
//! runs on its own; waiting for it is the batch's job.
//!
//! [`RequestBatch`]: super::RequestBatch

use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use super::address::NodeAddress;
use super::pending::{reply_channel, PendingReply, ReplySlot};
use super::timed_request::TimedRequest;
use crate::client::ConnectionFactory;
use crate::utils::{RequestError, RespValue};

/// Issues a request to a node without waiting for it
pub trait Dispatcher {
    type Pending: PendingReply;

    /// Send the pre-encoded `payload` to `node`
    fn dispatch(&self, node: &NodeAddress, payload: &Arc<[u8]>) -> TimedRequest<Self::Pending>;
}

/// Reply slot carrying a node's raw bulk reply
pub type RawReply = ReplySlot<Vec<u8>, RequestError>;

/// Runs each request on its own short-lived thread and connection
#[derive(Debug, Clone, Default)]
pub struct ThreadDispatcher {
    factory: ConnectionFactory,
}

impl ThreadDispatcher {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self { factory }
    }
}

impl Dispatcher for ThreadDispatcher {
    type Pending = RawReply;

    fn dispatch(&self, node: &NodeAddress, payload: &Arc<[u8]>) -> TimedRequest<RawReply> {
        let (sender, slot) = reply_channel();
        let request = TimedRequest::new(slot);

        let factory = self.factory.clone();
        let target = node.clone();
        let payload = Arc::clone(payload);
        let spawned = thread::Builder::new()
            .name(format!("topology-{}", node))
            .spawn(move || {
                let result = send(&factory, &target, &payload);
                if let Err(ref e) = result {
                    debug!("Request to {} failed: {}", target, e);
                }
                sender.complete(result);
            });

        // On spawn failure the closure, and with it the sender, is dropped,
        // which completes the slot as abandoned
        if let Err(e) = spawned {
            warn!("Failed to spawn request thread for {}: {}", node, e);
        }
        request
    }
}

fn send(
    factory: &ConnectionFactory,
    node: &NodeAddress,
    payload: &[u8],
) -> Result<Vec<u8>, RequestError> {
    let mut conn = factory.connect(node)?;
    match conn.request(payload)? {
        RespValue::Error(e) => Err(RequestError::Server(e)),
        other => {
            let kind = other.kind();
            other.into_bytes().ok_or_else(|| {
                RequestError::Protocol(format!("expected bulk string reply, got {}", kind))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Interrupt;
    use crate::utils::RespEncoder;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    fn payload() -> Arc<[u8]> {
        RespEncoder::command(&["CLUSTER", "NODES"]).into_bytes().into()
    }

    /// Serve one connection: swallow one command, then write `reply`
    fn serve_once(reply: &'static [u8]) -> (NodeAddress, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            let argc: usize = header.trim()[1..].parse().unwrap();
            for _ in 0..argc {
                let mut len_line = String::new();
                reader.read_line(&mut len_line).unwrap();
                let len: usize = len_line.trim()[1..].parse().unwrap();
                let mut arg = vec![0u8; len + 2];
                reader.read_exact(&mut arg).unwrap();
            }
            stream.write_all(reply).unwrap();
        });
        (NodeAddress::new("127.0.0.1", port), handle)
    }

    #[test]
    fn test_dispatch_collects_bulk_reply() {
        let (node, server) = serve_once(b"$6\r\nreport\r\n");
        let request = ThreadDispatcher::default().dispatch(&node, &payload());

        assert!(request
            .pending()
            .await_for(Duration::from_secs(5), &Interrupt::new())
            .unwrap());
        assert_eq!(request.outcome(), Some(Ok(b"report".to_vec())));
        server.join().unwrap();
    }

    #[test]
    fn test_dispatch_surfaces_server_error() {
        let (node, server) = serve_once(b"-ERR This instance has cluster support disabled\r\n");
        let request = ThreadDispatcher::default().dispatch(&node, &payload());

        request
            .pending()
            .await_for(Duration::from_secs(5), &Interrupt::new())
            .unwrap();
        assert_eq!(
            request.outcome(),
            Some(Err(RequestError::Server(
                "ERR This instance has cluster support disabled".to_string()
            )))
        );
        server.join().unwrap();
    }

    #[test]
    fn test_dispatch_rejects_non_bulk_reply() {
        let (node, server) = serve_once(b":1\r\n");
        let request = ThreadDispatcher::default().dispatch(&node, &payload());

        request
            .pending()
            .await_for(Duration::from_secs(5), &Interrupt::new())
            .unwrap();
        assert!(matches!(request.outcome(), Some(Err(RequestError::Protocol(_)))));
        server.join().unwrap();
    }
}
