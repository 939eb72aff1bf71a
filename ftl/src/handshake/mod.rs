/*!
The FTL handshake brings a stream online with ingest.

The handshake is a synchronous exchange over the control connection:

1. The ingest location is resolved and a TCP connection is opened to its control port.
2. The client asks for a nonce (`HMAC`) and authenticates the channel with an HMAC-SHA512
   digest of that nonce keyed by the stream key (`CONNECT`).
3. The client describes every component of the stream as attributes and finishes with `.`,
   at which point ingest accepts the stream and names the UDP port media should be sent to.

Any failure closes the control connection before returning.
*/

mod auth;
mod endpoint;

pub use self::auth::compute_digest;
pub use self::endpoint::{resolve, split_host_port};

use crate::components::{AudioComponent, VideoComponent};
use crate::connection::{ConnectionError, ControlConnection};
use crate::errors::FtlError;
use crate::messages::{IngestCommand, IngestResponse};
use crate::stream::FtlStreamConfig;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Everything the handshake needs to know about the stream being activated
pub struct HandshakeRequest<'a> {
    pub ingest_location: &'a str,
    pub channel_id: u64,
    pub authentication_key: &'a str,
    pub audio: Option<&'a AudioComponent>,
    pub video: Option<&'a VideoComponent>,
}

/// The outcome of a successful handshake: the still open control connection and where
/// media packets should be sent.
pub struct ActivatedSession {
    pub connection: ControlConnection,
    pub media_destination: SocketAddr,
}

/// Performs the full handshake, blocking until ingest accepts or rejects the stream
pub fn perform(
    request: &HandshakeRequest,
    config: &FtlStreamConfig,
) -> Result<ActivatedSession, FtlError> {
    let addresses = resolve(request.ingest_location, config.control_port).map_err(|error| {
        FtlError::DnsFailure {
            location: request.ingest_location.to_string(),
            reason: error.to_string(),
        }
    })?;

    let mut connection = open_connection(&addresses, config)?;
    authenticate(&mut connection, request)?;
    let media_port = register_components(&mut connection, request, config)?;

    let media_destination = SocketAddr::new(connection.peer_address().ip(), media_port);
    info!(
        channel_id = request.channel_id,
        ingest = %connection.peer_address(),
        media_destination = %media_destination,
        "Ingest accepted stream"
    );

    Ok(ActivatedSession {
        connection,
        media_destination,
    })
}

/// The attributes that describe the stream to ingest, in the order they are sent
pub fn stream_attributes(
    request: &HandshakeRequest,
    config: &FtlStreamConfig,
) -> Vec<IngestCommand> {
    let mut attributes = vec![
        IngestCommand::attribute("ProtocolVersion", &config.protocol_version),
        IngestCommand::attribute("VendorName", &config.vendor_name),
        IngestCommand::attribute("VendorVersion", &config.vendor_version),
    ];

    match request.video.and_then(|video| video.codec().wire_name().map(|name| (video, name))) {
        Some((video, codec_name)) => {
            attributes.push(IngestCommand::attribute("Video", "true"));
            attributes.push(IngestCommand::attribute("VideoCodec", codec_name));
            attributes.push(IngestCommand::attribute("VideoHeight", video.height()));
            attributes.push(IngestCommand::attribute("VideoWidth", video.width()));
            attributes.push(IngestCommand::attribute("VideoPayloadType", video.payload_type()));
            attributes.push(IngestCommand::attribute("VideoIngestSSRC", video.ssrc()));
        }

        None => attributes.push(IngestCommand::attribute("Video", "false")),
    }

    match request.audio.and_then(|audio| audio.codec().wire_name().map(|name| (audio, name))) {
        Some((audio, codec_name)) => {
            attributes.push(IngestCommand::attribute("Audio", "true"));
            attributes.push(IngestCommand::attribute("AudioCodec", codec_name));
            attributes.push(IngestCommand::attribute("AudioPayloadType", audio.payload_type()));
            attributes.push(IngestCommand::attribute("AudioIngestSSRC", audio.ssrc()));
        }

        None => attributes.push(IngestCommand::attribute("Audio", "false")),
    }

    attributes
}

fn open_connection(
    addresses: &[SocketAddr],
    config: &FtlStreamConfig,
) -> Result<ControlConnection, FtlError> {
    let mut last_error = None;
    for address in addresses {
        debug!(address = %address, "Connecting to ingest");
        match ControlConnection::connect(*address, config.connect_timeout, config.response_timeout)
        {
            Ok(connection) => return Ok(connection),
            Err(error) => {
                warn!(address = %address, error = %error, "Failed to connect to ingest");
                last_error = Some((*address, error));
            }
        }
    }

    Err(match last_error {
        Some((address, error)) => FtlError::ConnectError {
            address: address.to_string(),
            reason: error.to_string(),
        },
        None => FtlError::ConnectError {
            address: String::new(),
            reason: "no addresses to connect to".to_string(),
        },
    })
}

fn authenticate(
    connection: &mut ControlConnection,
    request: &HandshakeRequest,
) -> Result<(), FtlError> {
    let response = connection
        .request(&IngestCommand::Hmac)
        .map_err(|error| internal_error("requesting nonce", error))?;

    if !response.is_success() {
        return Err(FtlError::InternalError(format!(
            "ingest refused to hand out a nonce ({} {})",
            response.status_code, response.message
        )));
    }

    let nonce = response
        .nonce()
        .map_err(|error| FtlError::InternalError(error.to_string()))?;

    let digest = compute_digest(request.authentication_key, &nonce).ok_or_else(|| {
        FtlError::InternalError("stream key could not be used as an hmac key".to_string())
    })?;

    let command = IngestCommand::Connect {
        channel_id: request.channel_id,
        digest,
    };

    let response = connection
        .request(&command)
        .map_err(|error| internal_error("authenticating", error))?;

    expect_acceptance(response, "authentication")
}

fn register_components(
    connection: &mut ControlConnection,
    request: &HandshakeRequest,
    config: &FtlStreamConfig,
) -> Result<u16, FtlError> {
    for attribute in stream_attributes(request, config) {
        connection
            .send(&attribute)
            .map_err(|error| internal_error("describing stream", error))?;
    }

    let response = connection
        .request(&IngestCommand::Dot)
        .map_err(|error| internal_error("registering stream", error))?;

    let media_port = response.media_port().unwrap_or(config.default_media_port);
    expect_acceptance(response, "registration")?;

    Ok(media_port)
}

fn expect_acceptance(response: IngestResponse, step: &str) -> Result<(), FtlError> {
    if response.is_success() {
        debug!(step = step, "Ingest accepted handshake step");
        return Ok(());
    }

    if response.is_rejection() {
        warn!(
            step = step,
            code = response.status_code,
            message = %response.message,
            "Ingest rejected stream"
        );

        return Err(FtlError::StreamRejected {
            code: response.status_code,
            message: response.message,
        });
    }

    Err(FtlError::InternalError(format!(
        "unexpected reply during {}: {} {}",
        step, response.status_code, response.message
    )))
}

fn internal_error(step: &str, error: ConnectionError) -> FtlError {
    FtlError::InternalError(format!("failed while {}: {}", step, error))
}
