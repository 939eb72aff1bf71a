//! Policy tables for the values a component may leave unset.  These are pure functions so
//! they can be exercised without a stream.

use super::{AudioCodec, VideoCodec};
use rand::Rng;

/// Payload type used for Opus audio when the caller does not choose one
pub const OPUS_PAYLOAD_TYPE: u8 = 97;

/// Payload type used for VP8 video when the caller does not choose one
pub const VP8_PAYLOAD_TYPE: u8 = 96;

/// Resolves the payload type for an audio component.  A requested value of zero means unset.
pub fn audio_payload_type(codec: AudioCodec, requested: u8) -> u8 {
    if requested != 0 {
        return requested;
    }

    match codec {
        AudioCodec::Null => 0,
        AudioCodec::Opus => OPUS_PAYLOAD_TYPE,
    }
}

/// Resolves the payload type for a video component.  A requested value of zero means unset.
pub fn video_payload_type(codec: VideoCodec, requested: u8) -> u8 {
    if requested != 0 {
        return requested;
    }

    match codec {
        VideoCodec::Null => 0,
        VideoCodec::Vp8 => VP8_PAYLOAD_TYPE,
    }
}

/// Generates a random, non-zero SSRC that is not present in `taken`
pub fn generate_ssrc<R: Rng + ?Sized>(rng: &mut R, taken: &[u32]) -> u32 {
    loop {
        let candidate: u32 = rng.gen();
        if candidate != 0 && !taken.contains(&candidate) {
            return candidate;
        }
    }
}
