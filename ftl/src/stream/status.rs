use super::{StreamEvent, StreamState};
use crate::errors::FtlError;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// The part of a stream that both the caller's thread and the keepalive supervisor mutate.
/// All transitions happen while holding the lock.
pub(crate) struct SessionStatus {
    state: StreamState,
    last_error: Option<FtlError>,
    event_sender: Option<Sender<StreamEvent>>,
}

pub(crate) type SharedStatus = Arc<Mutex<SessionStatus>>;

impl SessionStatus {
    pub fn new_shared() -> SharedStatus {
        Arc::new(Mutex::new(SessionStatus {
            state: StreamState::Configured,
            last_error: None,
            event_sender: None,
        }))
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn last_error(&self) -> Option<FtlError> {
        self.last_error.clone()
    }

    pub fn set_event_sender(&mut self, sender: Sender<StreamEvent>) {
        self.event_sender = Some(sender);
    }

    pub fn mark_active(&mut self) {
        self.state = StreamState::Active;
        self.last_error = None;
    }

    /// Moves an active stream to inactive.  Returns false if the stream was not active, in
    /// which case nothing changes.
    pub fn mark_inactive(&mut self) -> bool {
        if self.state != StreamState::Active {
            return false;
        }

        self.state = StreamState::Inactive;
        true
    }

    /// Records a background failure.  Only the first failure of an active session moves the
    /// state and raises an event.
    pub fn mark_failed(&mut self, error: FtlError) -> bool {
        if !self.mark_inactive() {
            return false;
        }

        warn!(error = %error, "Stream lost its connection with ingest");
        self.last_error = Some(error.clone());
        self.raise(StreamEvent::KeepaliveFailed { error });
        true
    }

    /// Puts the state back after an activation that failed part way through
    pub fn restore(&mut self, state: StreamState) {
        self.state = state;
    }

    pub fn raise(&mut self, event: StreamEvent) {
        let disconnected = match self.event_sender {
            Some(ref sender) => sender.send(event).is_err(),
            None => false,
        };

        if disconnected {
            self.event_sender = None;
        }
    }
}

pub(crate) fn lock(status: &SharedStatus) -> MutexGuard<'_, SessionStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}
