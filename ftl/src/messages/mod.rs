/*!
This module contains the commands a client sends over the FTL control connection, as well as
functionality for parsing the replies ingest sends back.

Every command is a single line of text followed by an empty line (`\r\n\r\n`).  Every reply is
a single line starting with a three digit status code, modeled after HTTP codes.
*/

mod deserialization_errors;

pub use self::deserialization_errors::ResponseDeserializationError;
use bytes::{BufMut, Bytes, BytesMut};

const COMMAND_TERMINATOR: &[u8] = b"\r\n\r\n";
const MEDIA_PORT_MARKER: &str = "Use UDP port ";

/// An enumeration of all the commands a client can send to ingest
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum IngestCommand {
    /// Requests a nonce to compute the authentication digest with
    Hmac,

    /// Authenticates the channel with an HMAC digest of the nonce
    Connect { channel_id: u64, digest: String },

    /// Describes one property of the stream
    Attribute { key: String, value: String },

    /// Marks the end of the stream description, which asks ingest to accept the stream
    Dot,

    /// Liveness signal for an active stream
    Ping { channel_id: u64 },

    /// Takes the stream offline
    Disconnect,
}

impl IngestCommand {
    /// Creates an attribute command from anything that can be displayed
    pub fn attribute<V: ToString>(key: &str, value: V) -> IngestCommand {
        IngestCommand::Attribute {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Serializes the command into the bytes that go on the wire
    pub fn serialize(&self) -> Bytes {
        let line = match *self {
            IngestCommand::Hmac => "HMAC".to_string(),
            IngestCommand::Connect {
                channel_id,
                ref digest,
            } => format!("CONNECT {} ${}", channel_id, digest),
            IngestCommand::Attribute { ref key, ref value } => format!("{}: {}", key, value),
            IngestCommand::Dot => ".".to_string(),
            IngestCommand::Ping { channel_id } => format!("PING {}", channel_id),
            IngestCommand::Disconnect => "DISCONNECT".to_string(),
        };

        let mut bytes = BytesMut::with_capacity(line.len() + COMMAND_TERMINATOR.len());
        bytes.put_slice(line.as_bytes());
        bytes.put_slice(COMMAND_TERMINATOR);
        bytes.freeze()
    }
}

/// A reply sent by ingest in response to a command
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct IngestResponse {
    pub status_code: u16,
    pub message: String,
}

impl IngestResponse {
    /// Parses a single reply line
    pub fn parse(line: &str) -> Result<IngestResponse, ResponseDeserializationError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ResponseDeserializationError::EmptyResponse);
        }

        let (code, message) = match line.find(' ') {
            Some(index) => (&line[..index], line[index + 1..].trim()),
            None => (line, ""),
        };

        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ResponseDeserializationError::MissingStatusCode(
                line.to_string(),
            ));
        }

        let status_code = code
            .parse()
            .map_err(|_| ResponseDeserializationError::MissingStatusCode(line.to_string()))?;

        Ok(IngestResponse {
            status_code,
            message: message.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Ingest refused the request on purpose (bad credentials, quota, unsupported codec...)
    pub fn is_rejection(&self) -> bool {
        self.status_code >= 400 && self.status_code < 500
    }

    /// Decodes the nonce carried by a reply to the `HMAC` command
    pub fn nonce(&self) -> Result<Vec<u8>, ResponseDeserializationError> {
        let text = self.message.split_whitespace().next().unwrap_or("");
        if text.is_empty() {
            return Err(ResponseDeserializationError::InvalidNonce);
        }

        hex::decode(text).map_err(|_| ResponseDeserializationError::InvalidNonce)
    }

    /// The UDP port ingest assigned for media, if the reply names a usable one
    pub fn media_port(&self) -> Option<u16> {
        let index = self.message.find(MEDIA_PORT_MARKER)?;
        let digits: String = self.message[index + MEDIA_PORT_MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        digits.parse().ok().filter(|port| *port != 0)
    }
}
