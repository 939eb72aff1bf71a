use thiserror::Error;

/// Enumeration that represents the various errors that may occur while trying to
/// parse a reply line sent by ingest
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseDeserializationError {
    /// The reply contained no data at all
    #[error("The ingest reply was empty")]
    EmptyResponse,

    /// The reply did not start with a three digit status code
    #[error("The ingest reply '{0}' did not start with a status code")]
    MissingStatusCode(String),

    /// The `HMAC` reply did not carry a hex encoded nonce
    #[error("The ingest reply did not contain a valid hex encoded nonce")]
    InvalidNonce,

    /// The reply grew past the longest line ingest is allowed to send
    #[error("The ingest reply was longer than allowed ({0} bytes read)")]
    ResponseTooLong(usize),
}
