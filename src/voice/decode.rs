//! Audio file decoding (WAV and MP3) to mono f32 samples

use std::io::Cursor;
use std::path::Path;

use crate::{Error, Result};

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a WAV or MP3 file, picking the format from its header
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(b"RIFF") {
        decode_wav(&bytes)
    } else {
        decode_mp3(&bytes)
    }
}

/// Decode WAV bytes, averaging channels to mono
///
/// # Errors
///
/// Returns error if the data is not a readable WAV stream
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            #[allow(clippy::cast_precision_loss)]
            let to_f32 = |v: i32| v as f32 / scale;
            reader
                .samples::<i32>()
                .map(|s| s.map(to_f32))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?
        }
    };

    Ok(DecodedAudio {
        samples: super::downmix(&interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 bytes, averaging channels to mono
///
/// # Errors
///
/// Returns error on a corrupt frame
pub fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                let channels = u16::try_from(frame.channels.max(1)).unwrap_or(1);
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(super::downmix(&pcm, channels));
            }
            // ID3 tags and junk between frames
            Err(minimp3::Error::SkippedData) => {}
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Playback("no MP3 frames found".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn stereo_wav_is_averaged() {
        let decoded = decode_wav(&wav_bytes(2, &[16384, 0, -16384, -16384])).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
        assert!((decoded.samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn garbage_is_not_mp3() {
        assert!(decode_mp3(&[0u8; 64]).is_err());
    }
}
