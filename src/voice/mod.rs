//! Voice processing module
//!
//! Handles silence-terminated capture, file decoding, amplitude envelopes
//! and playback. Transcription and synthesis live in [`crate::provider`].

mod capture;
mod decode;
mod envelope;
mod playback;
mod silence;

pub use capture::{
    CaptureSettings, FrameSource, MicRecorder, MicSource, Recorder, Recording, downmix,
    record_from_source, record_from_source_in,
};
pub use decode::{DecodedAudio, decode_file, decode_mp3, decode_wav};
pub use envelope::{ENVELOPE_WINDOWS, Envelope, LEVELS_PER_SECOND};
pub use playback::{MpvPlayback, NativePlayback, Playback, build_playback};
pub use silence::{CALIBRATE_SECONDS, SilenceDetector, StopReason, frame_rms};
