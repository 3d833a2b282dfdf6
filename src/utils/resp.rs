//! RESP (Redis Serialization Protocol) encoder and decoder
//!
//! Only what topology probing needs: commands are encoded as arrays of bulk
//! strings and replies are decoded one value at a time from a buffered stream.

use std::io::BufRead;

use super::error::ProtocolError;

/// Upper bound for a single bulk reply (512 MiB, the server's own limit)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted in one reply
const MAX_NESTING: usize = 32;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Null bulk string or null array ($-1\r\n, *-1\r\n)
    Null,
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk string",
            RespValue::Null => "null",
            RespValue::Array(_) => "array",
        }
    }

    /// Consume a bulk or simple string reply into its raw bytes
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RespValue::BulkString(b) => Some(b),
            RespValue::SimpleString(s) => Some(s.into_bytes()),
            _ => None,
        }
    }
}

/// RESP command encoder with a reusable buffer
#[derive(Debug, Clone, Default)]
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Build an encoder holding a single command
    pub fn command(args: &[&str]) -> Self {
        let mut encoder = Self::with_capacity(16 * (args.len() + 1));
        encoder.encode_command_str(args);
        encoder
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Encode a command as a RESP array of bulk strings
    pub fn encode_command(&mut self, args: &[&[u8]]) {
        self.write_header(b'*', args.len());
        for arg in args {
            self.write_header(b'$', arg.len());
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    pub fn encode_command_str(&mut self, args: &[&str]) {
        let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.encode_command(&byte_args);
    }

    #[inline]
    fn write_header(&mut self, prefix: u8, len: usize) {
        let mut buffer = itoa::Buffer::new();
        self.buf.push(prefix);
        self.buf.extend_from_slice(buffer.format(len).as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }
}

/// Streaming RESP decoder over any buffered reader
pub struct RespDecoder<R> {
    reader: R,
    line_buf: String,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(256),
        }
    }

    /// Decode the next value from the stream
    pub fn decode(&mut self) -> Result<RespValue, ProtocolError> {
        self.decode_nested(0)
    }

    fn decode_nested(&mut self, depth: usize) -> Result<RespValue, ProtocolError> {
        let (type_byte, content) = self.read_line()?;

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(content)),
            b'-' => Ok(RespValue::Error(content)),
            b':' => content
                .parse()
                .map(RespValue::Integer)
                .map_err(|_| ProtocolError::InvalidInteger(content)),
            b'$' => {
                let len = parse_length("bulk string", &content)?;
                if len < 0 {
                    return Ok(RespValue::Null);
                }
                if len > MAX_BULK_LEN {
                    return Err(ProtocolError::InvalidLength {
                        what: "bulk string",
                        value: content,
                    });
                }

                // Payload plus trailing CRLF
                let mut data = vec![0u8; len as usize + 2];
                self.reader.read_exact(&mut data)?;
                data.truncate(len as usize);
                Ok(RespValue::BulkString(data))
            }
            b'*' => {
                let count = parse_length("array", &content)?;
                if count < 0 {
                    return Ok(RespValue::Null);
                }
                if depth >= MAX_NESTING {
                    return Err(ProtocolError::InvalidLength {
                        what: "array nesting",
                        value: (depth + 1).to_string(),
                    });
                }

                let mut elements = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    elements.push(self.decode_nested(depth + 1)?);
                }
                Ok(RespValue::Array(elements))
            }
            other => Err(ProtocolError::InvalidType(other)),
        }
    }

    /// Read one CRLF-terminated line, split into type byte and content
    fn read_line(&mut self) -> Result<(u8, String), ProtocolError> {
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 {
            return Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Connection closed",
            )));
        }

        let line = self.line_buf.trim_end_matches(&['\r', '\n'][..]);
        let type_byte = *line.as_bytes().first().ok_or(ProtocolError::EmptyLine)?;
        if !type_byte.is_ascii() {
            return Err(ProtocolError::InvalidType(type_byte));
        }
        Ok((type_byte, line[1..].to_string()))
    }
}

fn parse_length(what: &'static str, content: &str) -> Result<i64, ProtocolError> {
    content.parse().map_err(|_| ProtocolError::InvalidLength {
        what,
        value: content.to_string(),
    })
}
