//! Blocking TCP connection to the ingest control channel.  Reads and writes are bounded by
//! socket timeouts so no call can block forever on an unresponsive ingest.

use crate::messages::{IngestCommand, IngestResponse, ResponseDeserializationError};
use std::io;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

/// Longest reply line accepted from ingest, terminator included
pub const MAX_REPLY_LENGTH: usize = 4096;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("An IO error occurred on the control connection: {0}")]
    Io(#[from] io::Error),

    #[error("Ingest closed the control connection")]
    Closed,

    #[error("Ingest sent an invalid reply: {0}")]
    InvalidResponse(#[from] ResponseDeserializationError),
}

impl ConnectionError {
    /// True if the error only means the peer did not answer in time
    pub fn is_timeout(&self) -> bool {
        match *self {
            ConnectionError::Io(ref error) => match error.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => true,
                _ => false,
            },
            _ => false,
        }
    }
}

pub struct ControlConnection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    peer_address: SocketAddr,
    response_timeout: Duration,
    partial_line: Vec<u8>,
}

impl ControlConnection {
    /// Opens a connection to `address`.  Writes are bounded by `io_timeout` and each reply must
    /// arrive in full within `io_timeout` of starting to wait for it.
    pub fn connect(
        address: SocketAddr,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<ControlConnection, io::Error> {
        let writer = TcpStream::connect_timeout(&address, connect_timeout)?;
        writer.set_nodelay(true)?;
        writer.set_read_timeout(Some(io_timeout))?;
        writer.set_write_timeout(Some(io_timeout))?;

        let reader = BufReader::new(writer.try_clone()?);

        Ok(ControlConnection {
            writer,
            reader,
            peer_address: address,
            response_timeout: io_timeout,
            partial_line: Vec::new(),
        })
    }

    pub fn peer_address(&self) -> SocketAddr {
        self.peer_address
    }

    pub fn send(&mut self, command: &IngestCommand) -> Result<(), ConnectionError> {
        trace!(command = ?command, "Sending command to ingest");
        self.writer.write_all(&command.serialize())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Reads the next reply line, skipping blank lines, waiting at most the response timeout
    pub fn read_response(&mut self) -> Result<IngestResponse, ConnectionError> {
        let deadline = Instant::now() + self.response_timeout;
        self.read_response_before(deadline)
    }

    /// Reads the next non blank reply line, failing with a `TimedOut` error if it is not
    /// complete by `deadline`.  Bytes of a line cut short by the deadline are kept and
    /// completed by the next read.
    pub fn read_response_before(
        &mut self,
        deadline: Instant,
    ) -> Result<IngestResponse, ConnectionError> {
        loop {
            let line = self.read_line_before(deadline)?;
            let line = String::from_utf8_lossy(&line);
            if !line.trim().is_empty() {
                trace!(reply = %line.trim(), "Received reply from ingest");
                return Ok(IngestResponse::parse(&line)?);
            }
        }
    }

    fn read_line_before(&mut self, deadline: Instant) -> Result<Vec<u8>, ConnectionError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::from_secs(0) {
                return Err(ConnectionError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "ingest did not send a complete reply in time",
                )));
            }

            self.writer.set_read_timeout(Some(remaining))?;
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            };

            if available.is_empty() {
                return Err(ConnectionError::Closed);
            }

            let (consumed, complete) = match available.iter().position(|byte| *byte == b'\n') {
                Some(index) => (index + 1, true),
                None => (available.len(), false),
            };

            self.partial_line.extend_from_slice(&available[..consumed]);
            self.reader.consume(consumed);

            if self.partial_line.len() > MAX_REPLY_LENGTH {
                let length = self.partial_line.len();
                self.partial_line.clear();
                return Err(ResponseDeserializationError::ResponseTooLong(length).into());
            }

            if complete {
                return Ok(std::mem::take(&mut self.partial_line));
            }
        }
    }

    /// Sends a command and waits for its reply
    pub fn request(&mut self, command: &IngestCommand) -> Result<IngestResponse, ConnectionError> {
        self.send(command)?;
        self.read_response()
    }

    /// Closes both directions of the connection.  Errors are ignored since the peer may
    /// already be gone.
    pub fn shutdown(&self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

impl Drop for ControlConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
