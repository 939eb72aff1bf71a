use crate::stream::StreamState;
use thiserror::Error;

/// Status codes reported by fallible FTL operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FtlStatus {
    /// Operation was successful
    Success,

    /// The operation required an empty stream slot, but got one holding a stream
    NonZeroPointer,

    /// A resource required by the operation could not be allocated
    MallocFailure,

    /// The ingest location could not be resolved
    DnsFailure,

    /// Failed to connect to, or lost the connection with, the ingest
    ConnectError,

    /// Got valid inputs, but the action failed due to an internal failure
    InternalError,

    /// The configuration supplied was invalid or incomplete
    ConfigError,

    /// Ingest rejected the stream
    StreamRejected,

    /// The operation required an active stream and was passed an inactive one
    NotActiveStream,
}

/// Errors that can be raised while configuring, activating or tearing down an FTL stream
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FtlError {
    /// Encountered when `create_stream` is handed a slot that already holds a stream
    #[error("The stream slot already contains a stream")]
    NonZeroPointer,

    /// Encountered when the operating system refused a resource the session needs (threads,
    /// sockets for media)
    #[error("Failed to allocate a session resource: {0}")]
    MallocFailure(String),

    /// The ingest hostname did not resolve to any address
    #[error("Could not resolve ingest location '{location}': {reason}")]
    DnsFailure { location: String, reason: String },

    /// No transport connection could be opened to the resolved ingest addresses
    #[error("Failed to connect to ingest at {address}: {reason}")]
    ConnectError { address: String, reason: String },

    /// The ingest replied with something we could not make sense of, or the connection
    /// broke in the middle of the handshake
    #[error("Internal failure communicating with ingest: {0}")]
    InternalError(String),

    /// A required field was missing or invalid
    #[error("Invalid stream configuration: {0}")]
    ConfigError(String),

    /// Ingest refused the stream.  This is definitive and is never retried internally.
    #[error("Ingest rejected the stream with status {code}: {message}")]
    StreamRejected { code: u16, message: String },

    /// The operation requires an active stream
    #[error("The stream is not active")]
    NotActiveStream,

    /// Encountered if an operation is attempted while the stream is in a state that does not
    /// allow it (e.g. attaching a component to an active stream)
    #[error(
        "The operation could not be performed while the stream is in the {current_state:?} state"
    )]
    InvalidState { current_state: StreamState },

    /// Encountered when a component of a media kind is attached twice
    #[error("A {0} component is already attached to this stream")]
    ComponentAlreadyAttached(&'static str),

    /// The stream slot was already cleared by a previous `destroy_stream` call
    #[error("The stream has already been destroyed")]
    AlreadyDestroyed,

    /// Raised by the keepalive supervisor when the ingest stops answering pings or the
    /// control connection breaks while the stream is active
    #[error("Keepalive with ingest failed: {0}")]
    KeepaliveFailed(String),
}

impl FtlError {
    /// The status code this error is reported as
    pub fn status(&self) -> FtlStatus {
        match *self {
            FtlError::NonZeroPointer => FtlStatus::NonZeroPointer,
            FtlError::MallocFailure(_) => FtlStatus::MallocFailure,
            FtlError::DnsFailure { .. } => FtlStatus::DnsFailure,
            FtlError::ConnectError { .. } => FtlStatus::ConnectError,
            FtlError::InternalError(_) => FtlStatus::InternalError,
            FtlError::ConfigError(_) => FtlStatus::ConfigError,
            FtlError::StreamRejected { .. } => FtlStatus::StreamRejected,
            FtlError::NotActiveStream => FtlStatus::NotActiveStream,
            FtlError::InvalidState { .. } => FtlStatus::ConfigError,
            FtlError::ComponentAlreadyAttached(_) => FtlStatus::ConfigError,
            FtlError::AlreadyDestroyed => FtlStatus::ConfigError,
            FtlError::KeepaliveFailed(_) => FtlStatus::ConnectError,
        }
    }
}

/// Maps the outcome of an operation to its status code
pub fn status_of<T>(result: &Result<T, FtlError>) -> FtlStatus {
    match result {
        Ok(_) => FtlStatus::Success,
        Err(error) => error.status(),
    }
}
