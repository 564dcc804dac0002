//! Audio decoding and encoding
//!
//! Captured output and reference streams arrive as raw bytes from the
//! device. The container is detected from content; RIFF/WAVE PCM (8, 16,
//! 24, 32-bit integer and 32-bit float) is decoded with hound. Samples keep
//! their native rate and channel layout.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio::buffer::AudioBuffer;
use crate::error::{Result, RmfAudioError};

/// Container formats recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Wav,
    Flac,
    Ogg,
    Mp3,
    Unknown,
}

impl ContainerKind {
    /// Sniff the container from the first bytes of a file
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            ContainerKind::Wav
        } else if bytes.starts_with(b"fLaC") {
            ContainerKind::Flac
        } else if bytes.starts_with(b"OggS") {
            ContainerKind::Ogg
        } else if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
            ContainerKind::Mp3
        } else {
            ContainerKind::Unknown
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ContainerKind::Wav => "WAV",
            ContainerKind::Flac => "FLAC",
            ContainerKind::Ogg => "Ogg",
            ContainerKind::Mp3 => "MP3",
            ContainerKind::Unknown => "unknown",
        }
    }
}

/// Decode an in-memory audio file
///
/// # Errors
/// * `UnsupportedFormat` - If the content is not a RIFF/WAVE stream
/// * `InvalidAudio` - If the WAV header or sample data is malformed
pub fn decode_audio(bytes: &[u8]) -> Result<AudioBuffer> {
    match ContainerKind::detect(bytes) {
        ContainerKind::Wav => decode_wav(bytes),
        other => Err(RmfAudioError::UnsupportedFormat {
            format: format!("{} container (only WAV/PCM is decoded)", other.name()),
        }),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| RmfAudioError::InvalidAudio {
        reason: format!("Failed to parse WAV header: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    AudioBuffer::new(samples, spec.channels, spec.sample_rate)
}

/// Load and decode a WAV file from the local filesystem
pub fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path)?;
    decode_audio(&bytes)
}

/// Encode a buffer as an integer PCM WAV file in memory
///
/// Supported bit depths are 16, 24 and 32 (32 is written as float).
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(unsupported_bit_depth(bit_depth));
    }
    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_write_error)?;
        match bit_depth {
            16 => {
                for &sample in buffer.samples() {
                    let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                    writer.write_sample(scaled).map_err(wav_write_error)?;
                }
            }
            24 => {
                for &sample in buffer.samples() {
                    // 24-bit stored as i32 in hound
                    let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                    writer.write_sample(scaled).map_err(wav_write_error)?;
                }
            }
            32 => {
                for &sample in buffer.samples() {
                    writer.write_sample(sample).map_err(wav_write_error)?;
                }
            }
            _ => return Err(unsupported_bit_depth(bit_depth)),
        }
        writer.finalize().map_err(wav_write_error)?;
    }
    Ok(cursor.into_inner())
}

/// Encode and write a WAV file to the local filesystem
pub fn save_wav(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let bytes = encode_wav(buffer, bit_depth)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer::mono(samples, sample_rate)
}

/// Generate a mono linear chirp sweeping from `start_hz` to `end_hz`
///
/// The phase is integrated per sample so the instantaneous frequency moves
/// smoothly, which gives a pitch track with real variance.
pub fn generate_chirp(start_hz: f32, end_hz: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(num_samples);
    let mut phase = 0.0_f64;

    for i in 0..num_samples {
        let progress = i as f64 / num_samples.max(1) as f64;
        let freq = start_hz as f64 + (end_hz as f64 - start_hz as f64) * progress;
        samples.push(phase.sin() as f32);
        phase += 2.0 * std::f64::consts::PI * freq / sample_rate as f64;
    }

    AudioBuffer::mono(samples, sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn unsupported_bit_depth(bit_depth: u16) -> RmfAudioError {
    RmfAudioError::UnsupportedFormat {
        format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
    }
}

fn wav_write_error(e: hound::Error) -> RmfAudioError {
    RmfAudioError::InvalidAudio {
        reason: format!("Failed to encode WAV: {}", e),
        source: Some(Box::new(e)),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |e: hound::Error| RmfAudioError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid),
            _ => Err(RmfAudioError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_containers() {
        assert_eq!(ContainerKind::detect(b"RIFF\0\0\0\0WAVEfmt "), ContainerKind::Wav);
        assert_eq!(ContainerKind::detect(b"fLaC\0\0"), ContainerKind::Flac);
        assert_eq!(ContainerKind::detect(b"OggS\0"), ContainerKind::Ogg);
        assert_eq!(ContainerKind::detect(b"ID3\x04"), ContainerKind::Mp3);
        assert_eq!(ContainerKind::detect(b"hello"), ContainerKind::Unknown);
        assert_eq!(ContainerKind::detect(b""), ContainerKind::Unknown);
    }

    #[test]
    fn test_decode_rejects_non_wav() {
        let err = decode_audio(b"OggS and then some").unwrap_err();
        match err {
            RmfAudioError::UnsupportedFormat { format } => assert!(format.contains("Ogg")),
            other => panic!("Expected UnsupportedFormat, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_truncated_wav() {
        let err = decode_audio(b"RIFF\x24\0\0\0WAVE").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_16bit_stereo_keeps_native_layout() {
        let samples: Vec<f32> = (0..4410).map(|i| if i % 2 == 0 { 0.25 } else { -0.25 }).collect();
        let original = AudioBuffer::new(samples, 2, 22050).unwrap();

        let bytes = encode_wav(&original, 16).unwrap();
        let decoded = decode_audio(&bytes).unwrap();

        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.sample_rate(), 22050);
        assert_eq!(decoded.num_frames(), original.num_frames());
        for (orig, dec) in original.samples().iter().zip(decoded.samples()) {
            assert!((orig - dec).abs() < 0.001, "Sample mismatch: {} vs {}", orig, dec);
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(440.0, 0.1, 16000);

        save_wav(&tone, &path, 24).unwrap();
        let loaded = load_wav(&path).unwrap();

        assert_eq!(loaded.num_frames(), tone.num_frames());
        assert_eq!(loaded.sample_rate(), 16000);
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let tone = generate_test_tone(440.0, 0.01, 8000);
        assert!(matches!(
            encode_wav(&tone, 12),
            Err(RmfAudioError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            encode_wav(&tone, 8),
            Err(RmfAudioError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_chirp_length_and_range() {
        let chirp = generate_chirp(200.0, 400.0, 0.5, 16000);
        assert_eq!(chirp.num_frames(), 8000);
        assert!(chirp.samples().iter().all(|s| s.abs() <= 1.0));
    }
}
