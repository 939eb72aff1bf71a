/// Lifecycle state of a stream.  A stream that has not been created yet, or has been
/// destroyed, is represented by an empty slot rather than a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Created but never activated
    Configured,

    /// Ingest accepted the stream and the keepalive supervisor is running
    Active,

    /// Was active at some point, and has since been deactivated or lost its connection.
    /// The stream may be reconfigured and activated again.
    Inactive,
}
