/*!
Keeps an active stream online by pinging ingest on a background thread.

The supervisor owns nothing but clones of the shared control connection and session status.
Every ping is written while holding the connection lock, so the supervisor and a caller
tearing the stream down never write to the socket at the same time.  Once asked to stop it
sends nothing further, and `stop` only returns after the thread has exited.
*/

use crate::connection::{ConnectionError, ControlConnection};
use crate::errors::FtlError;
use crate::messages::IngestCommand;
use crate::stream::status::{lock, SharedStatus};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Timing parameters of the keepalive loop
#[derive(Clone, Copy, Debug)]
pub(crate) struct KeepaliveSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_missed: u32,
}

enum PingOutcome {
    Acknowledged,
    Missed(String),
    Fatal(String),
    Stopped,
}

pub(crate) struct KeepaliveSupervisor {
    stop_requested: Arc<AtomicBool>,
    stop_sender: Sender<()>,
    handle: JoinHandle<()>,
}

impl KeepaliveSupervisor {
    pub fn start(
        channel_id: u64,
        connection: Arc<Mutex<ControlConnection>>,
        status: SharedStatus,
        settings: KeepaliveSettings,
    ) -> Result<KeepaliveSupervisor, io::Error> {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (stop_sender, stop_receiver) = channel();
        let thread_stop_requested = stop_requested.clone();

        let handle = thread::Builder::new()
            .name(format!("ftl-keepalive-{}", channel_id))
            .spawn(move || {
                let mut missed = 0;
                let mut owed_replies = 0;
                loop {
                    match stop_receiver.recv_timeout(settings.interval) {
                        Err(RecvTimeoutError::Timeout) => (),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let outcome = ping(
                        channel_id,
                        &connection,
                        &thread_stop_requested,
                        settings.timeout,
                        &mut owed_replies,
                    );

                    let failure = match outcome {
                        PingOutcome::Stopped => break,
                        PingOutcome::Acknowledged => {
                            missed = 0;
                            None
                        }

                        PingOutcome::Missed(reason) => {
                            missed += 1;
                            warn!(channel_id, missed, reason = %reason, "Keepalive ping missed");
                            if missed >= settings.max_missed {
                                Some(format!(
                                    "{} consecutive pings went unanswered ({})",
                                    missed, reason
                                ))
                            } else {
                                None
                            }
                        }

                        PingOutcome::Fatal(reason) => Some(reason),
                    };

                    if let Some(reason) = failure {
                        lock(&status).mark_failed(FtlError::KeepaliveFailed(reason));
                        break;
                    }
                }

                debug!(channel_id, "Keepalive supervisor exited");
            })?;

        Ok(KeepaliveSupervisor {
            stop_requested,
            stop_sender,
            handle,
        })
    }

    /// Signals the supervisor to stop and waits for its thread to exit.  The wait is bounded
    /// by the connection's socket timeouts, since an in-flight ping is the only thing the
    /// thread can be blocked on.
    pub fn stop(self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let _ = self.stop_sender.send(());
        if self.handle.join().is_err() {
            warn!("Keepalive supervisor thread panicked");
        }
    }
}

/// Sends one ping and waits for its acknowledgment.  Pings carry no sequence number, so
/// replies that arrive for earlier timed out pings are skipped by counting them in
/// `owed_replies`.
fn ping(
    channel_id: u64,
    connection: &Mutex<ControlConnection>,
    stop_requested: &AtomicBool,
    timeout: Duration,
    owed_replies: &mut u32,
) -> PingOutcome {
    let mut connection = connection.lock().unwrap_or_else(PoisonError::into_inner);

    // Checked under the connection lock so a ping can never follow the teardown's
    // disconnect message.
    if stop_requested.load(Ordering::SeqCst) {
        return PingOutcome::Stopped;
    }

    if let Err(error) = connection.send(&IngestCommand::Ping { channel_id }) {
        return PingOutcome::Fatal(error.to_string());
    }

    let deadline = Instant::now() + timeout;
    loop {
        match connection.read_response_before(deadline) {
            Ok(_) if *owed_replies > 0 => {
                *owed_replies -= 1;
                trace!(channel_id, "Skipped late reply to an earlier ping");
            }

            Ok(ref response) if response.is_success() => return PingOutcome::Acknowledged,
            Ok(response) => {
                return PingOutcome::Missed(format!(
                    "unexpected reply {} {}",
                    response.status_code, response.message
                ))
            }

            Err(ref error) if error.is_timeout() => {
                *owed_replies += 1;
                return PingOutcome::Missed(error.to_string());
            }

            Err(error @ ConnectionError::InvalidResponse(_)) => {
                return PingOutcome::Missed(error.to_string())
            }

            Err(error) => return PingOutcome::Fatal(error.to_string()),
        }
    }
}
