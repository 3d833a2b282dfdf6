//! Blocking TCP connection to one node
//!
//! Topology probes are short-lived: connect, optionally AUTH, send one
//! command, read one reply. Reader and writer halves share the socket.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::cluster::{Credentials, NodeAddress};
use crate::utils::{ConnectionError, ProtocolError, RespDecoder, RespEncoder, RespValue};

/// Connected socket with buffered reader/writer
pub struct Connection {
    writer: BufWriter<TcpStream>,
    reader: BufReader<TcpStream>,
}

impl Connection {
    /// Open a TCP connection to `host:port`
    pub fn connect_tcp(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let connect_failed = |source: io::Error| ConnectionError::ConnectFailed {
            host: host.to_string(),
            port,
            source,
        };

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(connect_failed)?
            .next()
            .ok_or_else(|| {
                connect_failed(io::Error::new(io::ErrorKind::NotFound, "No addresses found"))
            })?;

        let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(connect_failed)?;
        stream.set_nodelay(true).ok();

        let writer = BufWriter::with_capacity(4096, stream.try_clone().map_err(connect_failed)?);
        let reader = BufReader::with_capacity(65536, stream);

        Ok(Connection { writer, reader })
    }

    /// Send a pre-encoded command and read one reply
    pub fn request(&mut self, payload: &[u8]) -> Result<RespValue, ProtocolError> {
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        RespDecoder::new(&mut self.reader).decode()
    }

    pub fn execute(&mut self, encoder: &RespEncoder) -> Result<RespValue, ProtocolError> {
        self.request(encoder.as_bytes())
    }

    /// Send AUTH with the node's credentials
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ConnectionError> {
        let encoder = match credentials.username.as_deref() {
            Some(user) => RespEncoder::command(&["AUTH", user, &credentials.password]),
            None => RespEncoder::command(&["AUTH", &credentials.password]),
        };

        match self.execute(&encoder) {
            Ok(RespValue::SimpleString(s)) if s == "OK" => Ok(()),
            Ok(RespValue::Error(e)) => Err(ConnectionError::AuthFailed(e)),
            Ok(other) => Err(ConnectionError::AuthFailed(format!(
                "Unexpected response: {:?}",
                other
            ))),
            Err(e) => Err(ConnectionError::AuthFailed(format!("IO error: {}", e))),
        }
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.writer.get_ref().set_write_timeout(timeout)
    }
}

/// Connection settings shared by every node a probe talks to
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionFactory {
    /// Connect to `node`, authenticating if it carries credentials
    pub fn connect(&self, node: &NodeAddress) -> Result<Connection, ConnectionError> {
        let mut conn = Connection::connect_tcp(node.host(), node.port(), self.connect_timeout)?;

        conn.set_read_timeout(Some(self.read_timeout)).ok();
        conn.set_write_timeout(Some(self.write_timeout)).ok();

        if let Some(credentials) = node.credentials() {
            conn.authenticate(credentials)?;
            debug!("Authenticated to {}", node);
        }

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read};
    use std::net::TcpListener;
    use std::thread;

    /// Accept one connection, answer each request line-set with the next canned reply
    fn serve(replies: Vec<&'static [u8]>) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut received = Vec::new();
            for reply in replies {
                // Read one array command: header then 2 lines per argument
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                received.extend_from_slice(header.as_bytes());
                let argc: usize = header.trim()[1..].parse().unwrap();
                for _ in 0..argc {
                    let mut len_line = String::new();
                    reader.read_line(&mut len_line).unwrap();
                    let len: usize = len_line.trim()[1..].parse().unwrap();
                    let mut arg = vec![0u8; len + 2];
                    reader.read_exact(&mut arg).unwrap();
                    received.extend_from_slice(len_line.as_bytes());
                    received.extend_from_slice(&arg);
                }
                writer.write_all(reply).unwrap();
            }
            received
        });
        (port, handle)
    }

    fn factory() -> ConnectionFactory {
        ConnectionFactory {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_request_round_trip_over_socket() {
        let (port, server) = serve(vec![b"$5\r\nhello\r\n"]);
        let mut conn = factory().connect(&NodeAddress::new("127.0.0.1", port)).unwrap();

        let reply = conn.execute(&RespEncoder::command(&["CLUSTER", "NODES"])).unwrap();
        assert_eq!(reply, RespValue::BulkString(b"hello".to_vec()));
        assert_eq!(
            server.join().unwrap(),
            b"*2\r\n$7\r\nCLUSTER\r\n$5\r\nNODES\r\n".to_vec()
        );
    }

    #[test]
    fn test_connect_authenticates_with_credentials() {
        let (port, server) = serve(vec![b"+OK\r\n"]);
        let node = NodeAddress::new("127.0.0.1", port).with_credentials(Some(Credentials {
            username: Some("probe".to_string()),
            password: "secret".to_string(),
        }));

        factory().connect(&node).unwrap();
        assert_eq!(
            server.join().unwrap(),
            b"*3\r\n$4\r\nAUTH\r\n$5\r\nprobe\r\n$6\r\nsecret\r\n".to_vec()
        );
    }

    #[test]
    fn test_auth_rejection() {
        let (port, server) = serve(vec![b"-WRONGPASS invalid username-password pair\r\n"]);
        let node = NodeAddress::new("127.0.0.1", port).with_credentials(Some(Credentials {
            username: None,
            password: "nope".to_string(),
        }));

        let err = factory().connect(&node).err().unwrap();
        assert!(matches!(err, ConnectionError::AuthFailed(ref msg) if msg.starts_with("WRONGPASS")));
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let result = factory().connect(&NodeAddress::new("127.0.0.1", port));
        assert!(matches!(result, Err(ConnectionError::ConnectFailed { .. })));
    }
}
