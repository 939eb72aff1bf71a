use std::time::Duration;

/// Configuration options that govern how an FTL stream talks to ingest
#[derive(Clone, Debug)]
pub struct FtlStreamConfig {
    /// TCP port of the ingest control channel, used unless the ingest location names a port
    pub control_port: u16,

    /// UDP port media is sent to when ingest does not assign one
    pub default_media_port: u16,

    /// How long to wait for the control connection to open, per resolved address
    pub connect_timeout: Duration,

    /// How long to wait for ingest to answer a handshake command
    pub response_timeout: Duration,

    /// Time between two keepalive pings
    pub keepalive_interval: Duration,

    /// How long to wait for ingest to acknowledge a keepalive ping
    pub keepalive_timeout: Duration,

    /// Number of consecutive unanswered pings after which the stream is considered lost
    pub max_missed_keepalives: u32,

    pub protocol_version: String,
    pub vendor_name: String,
    pub vendor_version: String,
}

impl FtlStreamConfig {
    /// Creates a new configuration object with default values
    pub fn new() -> FtlStreamConfig {
        FtlStreamConfig {
            control_port: 8084,
            default_media_port: 8082,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(5),
            keepalive_timeout: Duration::from_secs(5),
            max_missed_keepalives: 3,
            protocol_version: "0.9".to_string(),
            vendor_name: "rml_ftl".to_string(),
            vendor_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for FtlStreamConfig {
    fn default() -> Self {
        FtlStreamConfig::new()
    }
}
