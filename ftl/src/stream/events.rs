use crate::errors::FtlError;
use std::net::SocketAddr;

/// Events raised by a stream so the owning application can react to lifecycle changes,
/// including the ones that happen in the background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Ingest accepted the stream and media can now be sent to `media_destination`
    Activated { media_destination: SocketAddr },

    /// The stream was deactivated at the caller's request
    Deactivated,

    /// The keepalive supervisor lost contact with ingest and moved the stream to the
    /// inactive state
    KeepaliveFailed { error: FtlError },
}
