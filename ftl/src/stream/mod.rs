/*!
The stream lifecycle controller.

A stream lives in a caller owned slot (`Option<FtlStream>`).  `create_stream` fills an empty
slot with a stream in the `Configured` state, the setters and attach calls describe the
stream, `activate` performs the handshake and starts the keepalive supervisor, `deactivate`
takes the stream offline again, and `destroy_stream` tears everything down and clears the
slot.

```no_run
use rml_ftl::{AudioCodec, AudioComponent, VideoCodec, VideoComponent};

let mut slot = None;
rml_ftl::create_stream(&mut slot).unwrap();

let stream = slot.as_mut().unwrap();
stream.set_ingest_location("ingest.example.com").unwrap();
stream.set_credentials(42, "secret").unwrap();
stream.attach_audio_component(AudioComponent::new(AudioCodec::Opus, 0, 0)).unwrap();
stream.attach_video_component(VideoComponent::new(VideoCodec::Vp8, 0, 0, 1280, 720)).unwrap();
stream.activate().unwrap();

// ... send media ...

stream.deactivate().unwrap();
rml_ftl::destroy_stream(&mut slot).unwrap();
```
*/

mod config;
mod events;
mod state;
pub(crate) mod status;


pub use self::config::FtlStreamConfig;
pub use self::events::StreamEvent;
pub use self::state::StreamState;

use self::status::{lock, SessionStatus, SharedStatus};
use crate::components::{
    AudioCodec, AudioComponent, MediaKind, StreamComponent, VideoCodec, VideoComponent,
};
use crate::connection::ControlConnection;
use crate::errors::FtlError;
use crate::handshake::{self, ActivatedSession, HandshakeRequest};
use crate::keepalive::{KeepaliveSettings, KeepaliveSupervisor};
use crate::media::{rtp_ssrc, MediaSink, PacketProtector};
use crate::messages::IngestCommand;
use std::fmt;
use std::net::SocketAddr;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Fills an empty slot with a new stream using the default configuration
pub fn create_stream(slot: &mut Option<FtlStream>) -> Result<(), FtlError> {
    create_stream_with_config(slot, FtlStreamConfig::new())
}

/// Fills an empty slot with a new stream.  Fails with `NonZeroPointer` if the slot already
/// holds a stream, which is left untouched.
pub fn create_stream_with_config(
    slot: &mut Option<FtlStream>,
    config: FtlStreamConfig,
) -> Result<(), FtlError> {
    if slot.is_some() {
        return Err(FtlError::NonZeroPointer);
    }

    *slot = Some(FtlStream::new(config));
    Ok(())
}

/// Deactivates the stream if it is active, releases everything it owns and clears the
/// slot.  Destroying an already cleared slot reports `AlreadyDestroyed`.
pub fn destroy_stream(slot: &mut Option<FtlStream>) -> Result<(), FtlError> {
    let mut stream = slot.take().ok_or(FtlError::AlreadyDestroyed)?;
    if stream.state() == StreamState::Active {
        if let Err(error) = stream.deactivate() {
            debug!(error = %error, "Implicit deactivation during destroy did not complete cleanly");
        }
    }

    stream.release_session();
    Ok(())
}

#[derive(Clone)]
struct Credentials {
    channel_id: u64,
    authentication_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("channel_id", &self.channel_id)
            .field("authentication_key", &"<redacted>")
            .finish()
    }
}

/// Resources that exist only while a stream is (or was until a background failure) active
struct ActiveSession {
    connection: Arc<Mutex<ControlConnection>>,
    supervisor: KeepaliveSupervisor,
    media: MediaSink,
}

/// A single FTL stream: one audio and one video component published to one ingest
pub struct FtlStream {
    config: FtlStreamConfig,
    ingest_location: Option<String>,
    credentials: Option<Credentials>,
    audio: Option<AudioComponent>,
    video: Option<VideoComponent>,
    packet_protector: Option<Box<dyn PacketProtector>>,
    status: SharedStatus,
    session: Option<ActiveSession>,
}

impl FtlStream {
    fn new(config: FtlStreamConfig) -> FtlStream {
        FtlStream {
            config,
            ingest_location: None,
            credentials: None,
            audio: None,
            video: None,
            packet_protector: None,
            status: SessionStatus::new_shared(),
            session: None,
        }
    }

    pub fn state(&self) -> StreamState {
        lock(&self.status).state()
    }

    /// The error that made the stream leave the active state on its own, if any.  Cleared
    /// on the next successful activation.
    pub fn last_error(&self) -> Option<FtlError> {
        lock(&self.status).last_error()
    }

    /// Returns a receiver for lifecycle events.  Only the most recently returned receiver
    /// gets events.
    pub fn events(&mut self) -> Receiver<StreamEvent> {
        let (sender, receiver) = channel();
        lock(&self.status).set_event_sender(sender);
        receiver
    }

    pub fn config(&self) -> &FtlStreamConfig {
        &self.config
    }

    pub fn ingest_location(&self) -> Option<&str> {
        self.ingest_location.as_ref().map(|location| location.as_str())
    }

    pub fn channel_id(&self) -> Option<u64> {
        self.credentials.as_ref().map(|credentials| credentials.channel_id)
    }

    pub fn audio_component(&self) -> Option<&AudioComponent> {
        self.audio.as_ref()
    }

    pub fn video_component(&self) -> Option<&VideoComponent> {
        self.video.as_ref()
    }

    /// Where media is sent while the stream is active
    pub fn media_destination(&self) -> Option<SocketAddr> {
        match self.state() {
            StreamState::Active => self.session.as_ref().map(|session| session.media.destination()),
            _ => None,
        }
    }

    pub fn set_ingest_location(&mut self, location: &str) -> Result<(), FtlError> {
        self.ensure_not_active()?;
        self.ingest_location = Some(location.to_string());
        Ok(())
    }

    pub fn set_credentials(
        &mut self,
        channel_id: u64,
        authentication_key: &str,
    ) -> Result<(), FtlError> {
        self.ensure_not_active()?;
        self.credentials = Some(Credentials {
            channel_id,
            authentication_key: authentication_key.to_string(),
        });

        Ok(())
    }

    /// Installs the transform applied to every media packet before it is sent
    pub fn set_packet_protector(
        &mut self,
        protector: Box<dyn PacketProtector>,
    ) -> Result<(), FtlError> {
        self.ensure_not_active()?;
        self.packet_protector = Some(protector);
        Ok(())
    }

    /// Takes ownership of the audio component.  Fails if an audio component is already
    /// attached or the stream is active.
    pub fn attach_audio_component(
        &mut self,
        mut component: AudioComponent,
    ) -> Result<(), FtlError> {
        self.ensure_not_active()?;
        if self.audio.is_some() {
            return Err(FtlError::ComponentAlreadyAttached(MediaKind::Audio.name()));
        }

        if let Some(ref video) = self.video {
            if component.ssrc() == video.ssrc() {
                if !component.ssrc_generated() {
                    return Err(FtlError::ConfigError(format!(
                        "audio ssrc {} is already used by the video component",
                        component.ssrc()
                    )));
                }

                component.regenerate_ssrc(&mut rand::thread_rng(), &[video.ssrc()]);
            }
        }

        self.audio = Some(component);
        Ok(())
    }

    /// Takes ownership of the video component.  Fails if a video component is already
    /// attached or the stream is active.
    pub fn attach_video_component(
        &mut self,
        mut component: VideoComponent,
    ) -> Result<(), FtlError> {
        self.ensure_not_active()?;
        if self.video.is_some() {
            return Err(FtlError::ComponentAlreadyAttached(MediaKind::Video.name()));
        }

        if let Some(ref audio) = self.audio {
            if component.ssrc() == audio.ssrc() {
                if !component.ssrc_generated() {
                    return Err(FtlError::ConfigError(format!(
                        "video ssrc {} is already used by the audio component",
                        component.ssrc()
                    )));
                }

                component.regenerate_ssrc(&mut rand::thread_rng(), &[audio.ssrc()]);
            }
        }

        self.video = Some(component);
        Ok(())
    }

    pub fn attach_component(&mut self, component: StreamComponent) -> Result<(), FtlError> {
        match component {
            StreamComponent::Audio(audio) => self.attach_audio_component(audio),
            StreamComponent::Video(video) => self.attach_video_component(video),
        }
    }

    /// Brings the stream online.  Blocks until ingest accepts or rejects the stream, or the
    /// connection attempt fails.  On failure the stream stays in the state it was in and
    /// nothing from the attempt is kept.
    pub fn activate(&mut self) -> Result<(), FtlError> {
        let previous_state = self.state();
        if previous_state == StreamState::Active {
            return Err(FtlError::InvalidState {
                current_state: previous_state,
            });
        }

        // A supervisor that gave up on its own leaves its handles behind
        self.release_session();

        let ingest_location = match self.ingest_location {
            Some(ref location) if !location.trim().is_empty() => location.clone(),
            _ => return Err(FtlError::ConfigError("ingest location is not set".to_string())),
        };

        let credentials = match self.credentials {
            Some(ref credentials) if !credentials.authentication_key.is_empty() => {
                credentials.clone()
            }
            _ => return Err(FtlError::ConfigError("credentials are not set".to_string())),
        };

        self.validate_components()?;

        info!(
            channel_id = credentials.channel_id,
            ingest = %ingest_location,
            "Activating stream"
        );

        let request = HandshakeRequest {
            ingest_location: &ingest_location,
            channel_id: credentials.channel_id,
            authentication_key: &credentials.authentication_key,
            audio: self.audio.as_ref(),
            video: self.video.as_ref(),
        };

        let ActivatedSession {
            mut connection,
            media_destination,
        } = handshake::perform(&request, &self.config)?;

        let media = match MediaSink::open(media_destination) {
            Ok(media) => media,
            Err(error) => {
                send_disconnect(&mut connection);
                return Err(FtlError::MallocFailure(format!(
                    "could not open media socket: {}",
                    error
                )));
            }
        };

        let connection = Arc::new(Mutex::new(connection));
        lock(&self.status).mark_active();

        let settings = KeepaliveSettings {
            interval: self.config.keepalive_interval,
            timeout: self.config.keepalive_timeout,
            max_missed: self.config.max_missed_keepalives,
        };

        let supervisor = match KeepaliveSupervisor::start(
            credentials.channel_id,
            connection.clone(),
            self.status.clone(),
            settings,
        ) {
            Ok(supervisor) => supervisor,
            Err(error) => {
                lock(&self.status).restore(previous_state);
                send_disconnect(&mut connection.lock().unwrap_or_else(PoisonError::into_inner));
                return Err(FtlError::MallocFailure(format!(
                    "could not start keepalive supervisor: {}",
                    error
                )));
            }
        };

        self.session = Some(ActiveSession {
            connection,
            supervisor,
            media,
        });

        lock(&self.status).raise(StreamEvent::Activated { media_destination });
        Ok(())
    }

    /// Takes an active stream offline: stops the keepalive supervisor, tells ingest the
    /// stream is going away and closes the control connection.  Never blocks longer than
    /// the configured socket timeouts, even if ingest is unreachable.
    pub fn deactivate(&mut self) -> Result<(), FtlError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => return Err(FtlError::NotActiveStream),
        };

        session.supervisor.stop();

        let mut status = lock(&self.status);
        if !status.mark_inactive() {
            // The supervisor already took the stream offline
            session.connection.lock().unwrap_or_else(PoisonError::into_inner).shutdown();
            return Err(FtlError::NotActiveStream);
        }

        send_disconnect(&mut session.connection.lock().unwrap_or_else(PoisonError::into_inner));
        status.raise(StreamEvent::Deactivated);
        info!(channel_id = ?self.channel_id(), "Stream deactivated");
        Ok(())
    }

    /// Sends a complete RTP packet for one of the attached components.  The packet's SSRC
    /// must match the component of that kind.
    pub fn send_media_packet(&mut self, kind: MediaKind, packet: &[u8]) -> Result<(), FtlError> {
        if self.state() != StreamState::Active {
            return Err(FtlError::NotActiveStream);
        }

        let expected_ssrc = match kind {
            MediaKind::Audio => self.audio.as_ref().map(|audio| audio.ssrc()),
            MediaKind::Video => self.video.as_ref().map(|video| video.ssrc()),
        }
        .ok_or_else(|| FtlError::ConfigError(format!("no {} component is attached", kind.name())))?;

        match rtp_ssrc(packet) {
            Some(ssrc) if ssrc == expected_ssrc => (),
            Some(ssrc) => {
                return Err(FtlError::ConfigError(format!(
                    "packet ssrc {} does not match the {} component ssrc {}",
                    ssrc,
                    kind.name(),
                    expected_ssrc
                )))
            }
            None => {
                return Err(FtlError::ConfigError(
                    "packet is shorter than an rtp header".to_string(),
                ))
            }
        }

        let session = self.session.as_ref().ok_or(FtlError::NotActiveStream)?;
        let result = match self.packet_protector {
            Some(ref mut protector) => {
                let protected = protector.protect(kind, packet).map_err(|error| {
                    FtlError::InternalError(format!("packet protection failed: {}", error))
                })?;

                session.media.send(&protected)
            }

            None => session.media.send(packet),
        };

        result.map(|_| ()).map_err(|error| {
            FtlError::InternalError(format!("failed to send media packet: {}", error))
        })
    }

    fn ensure_not_active(&self) -> Result<(), FtlError> {
        match self.state() {
            StreamState::Active => Err(FtlError::InvalidState {
                current_state: StreamState::Active,
            }),
            _ => Ok(()),
        }
    }

    fn validate_components(&self) -> Result<(), FtlError> {
        if let Some(ref video) = self.video {
            if video.codec() != VideoCodec::Null && (video.width() == 0 || video.height() == 0) {
                return Err(FtlError::ConfigError(
                    "video component needs a non-zero width and height".to_string(),
                ));
            }
        }

        let has_audio = self.audio.as_ref().map_or(false, |a| a.codec() != AudioCodec::Null);
        let has_video = self.video.as_ref().map_or(false, |v| v.codec() != VideoCodec::Null);
        if !has_audio && !has_video {
            return Err(FtlError::ConfigError("stream has no audio or video component".to_string()));
        }

        Ok(())
    }

    /// Drops whatever is left of a previous session: stops the supervisor if it is still
    /// running and closes the connection
    fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.supervisor.stop();
            session.connection.lock().unwrap_or_else(PoisonError::into_inner).shutdown();
        }
    }
}

impl Drop for FtlStream {
    fn drop(&mut self) {
        if self.state() == StreamState::Active {
            if let Err(error) = self.deactivate() {
                warn!(error = %error, "Failed to deactivate stream while dropping it");
            }
        }

        self.release_session();
    }
}

impl fmt::Debug for FtlStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FtlStream")
            .field("state", &self.state())
            .field("ingest_location", &self.ingest_location)
            .field("credentials", &self.credentials)
            .field("audio", &self.audio)
            .field("video", &self.video)
            .finish()
    }
}

/// Best effort: ingest may already be unreachable, in which case the write times out
fn send_disconnect(connection: &mut ControlConnection) {
    if let Err(error) = connection.send(&IngestCommand::Disconnect) {
        debug!(error = %error, "Could not send disconnect to ingest");
    }

    connection.shutdown();
}
