//! Descriptions of the media components (one audio, one video) that make up an FTL stream.
//!
//! Components are created standalone and then handed to a stream, which takes ownership of
//! them.  Codec, payload type and SSRC are fixed once the component is attached.

pub mod defaults;

use rand::Rng;

/// The kind of media a component carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match *self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Audio codecs supported by FTL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    /// No audio for this stream
    Null,

    /// Xiph's Opus audio codec
    Opus,
}

impl AudioCodec {
    /// Name of the codec as announced to ingest, if the stream carries audio at all
    pub fn wire_name(&self) -> Option<&'static str> {
        match *self {
            AudioCodec::Null => None,
            AudioCodec::Opus => Some("OPUS"),
        }
    }
}

/// Video codecs supported by FTL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    /// No video for this stream
    Null,

    /// Google's VP8 codec
    Vp8,
}

impl VideoCodec {
    /// Name of the codec as announced to ingest, if the stream carries video at all
    pub fn wire_name(&self) -> Option<&'static str> {
        match *self {
            VideoCodec::Null => None,
            VideoCodec::Vp8 => Some("VP8"),
        }
    }
}

/// Configuration of the audio component of a stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioComponent {
    codec: AudioCodec,
    payload_type: u8,
    ssrc: u32,
    ssrc_generated: bool,
}

impl AudioComponent {
    /// Creates an audio component.  A `payload_type` or `ssrc` of zero selects a default
    /// payload type for the codec or a randomly generated SSRC respectively.
    pub fn new(codec: AudioCodec, payload_type: u8, ssrc: u32) -> AudioComponent {
        let (ssrc, ssrc_generated) = resolve_ssrc(ssrc);
        AudioComponent {
            codec,
            payload_type: defaults::audio_payload_type(codec, payload_type),
            ssrc,
            ssrc_generated,
        }
    }

    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub(crate) fn ssrc_generated(&self) -> bool {
        self.ssrc_generated
    }

    pub(crate) fn regenerate_ssrc<R: Rng + ?Sized>(&mut self, rng: &mut R, taken: &[u32]) {
        self.ssrc = defaults::generate_ssrc(rng, taken);
    }
}

/// Configuration of the video component of a stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoComponent {
    codec: VideoCodec,
    payload_type: u8,
    ssrc: u32,
    ssrc_generated: bool,
    width: u32,
    height: u32,
}

impl VideoComponent {
    /// Creates a video component.  A `payload_type` or `ssrc` of zero selects a default
    /// payload type for the codec or a randomly generated SSRC respectively.
    pub fn new(
        codec: VideoCodec,
        payload_type: u8,
        ssrc: u32,
        width: u32,
        height: u32,
    ) -> VideoComponent {
        let (ssrc, ssrc_generated) = resolve_ssrc(ssrc);
        VideoComponent {
            codec,
            payload_type: defaults::video_payload_type(codec, payload_type),
            ssrc,
            ssrc_generated,
            width,
            height,
        }
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn ssrc_generated(&self) -> bool {
        self.ssrc_generated
    }

    pub(crate) fn regenerate_ssrc<R: Rng + ?Sized>(&mut self, rng: &mut R, taken: &[u32]) {
        self.ssrc = defaults::generate_ssrc(rng, taken);
    }
}

/// Either kind of component, for callers that attach components generically
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamComponent {
    Audio(AudioComponent),
    Video(VideoComponent),
}

impl From<AudioComponent> for StreamComponent {
    fn from(component: AudioComponent) -> Self {
        StreamComponent::Audio(component)
    }
}

impl From<VideoComponent> for StreamComponent {
    fn from(component: VideoComponent) -> Self {
        StreamComponent::Video(component)
    }
}

fn resolve_ssrc(requested: u32) -> (u32, bool) {
    match requested {
        0 => (defaults::generate_ssrc(&mut rand::thread_rng(), &[]), true),
        x => (x, false),
    }
}
