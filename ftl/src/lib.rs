//! Client library for publishing live audio/video streams to an FTL ingest.
//!
//! A stream is described by an ingest location, channel credentials and one audio plus one
//! video component.  Activating it performs the FTL handshake and keeps the stream online with
//! a background keepalive until it is deactivated.  See the [`stream`] module for the
//! lifecycle.

pub mod components;
pub mod errors;
pub mod handshake;
pub mod media;
pub mod messages;
pub mod stream;

mod connection;
mod keepalive;

#[cfg(test)]
mod test_utils;

pub use crate::components::{
    AudioCodec, AudioComponent, MediaKind, StreamComponent, VideoCodec, VideoComponent,
};
pub use crate::errors::{status_of, FtlError, FtlStatus};
pub use crate::media::PacketProtector;
pub use crate::stream::{
    create_stream, create_stream_with_config, destroy_stream, FtlStream, FtlStreamConfig,
    StreamEvent, StreamState,
};

use std::sync::Once;
use tracing::debug;

static INIT: Once = Once::new();

/// Performs process wide initialization.  Safe to call any number of times; only the first
/// call does anything.  Streams work without it.
pub fn init() -> Result<(), FtlError> {
    INIT.call_once(|| {
        debug!(version = env!("CARGO_PKG_VERSION"), "Initialized rml_ftl");
    });

    Ok(())
}
