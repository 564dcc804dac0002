//! Decoded audio waveform
//!
//! AudioBuffer holds interleaved samples at their native rate. Buffers are
//! never resampled: pitch extraction runs at whatever rate was decoded.

use crate::error::{Result, RmfAudioError};

/// Audio sample data with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved audio samples normalized to -1.0..1.0
    samples: Vec<f32>,
    /// Number of audio channels (1 = mono, 2 = stereo, ...)
    channels: u16,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new audio buffer with the given parameters
    ///
    /// An empty sample vector is accepted; analysis of an empty buffer
    /// yields an empty pitch series rather than an error.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(RmfAudioError::UnsupportedFormat {
                format: "0-channel audio".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(RmfAudioError::UnsupportedFormat {
                format: "0 Hz sample rate".to_string(),
            });
        }
        if samples.len() % channels as usize != 0 {
            return Err(RmfAudioError::InvalidAudio {
                reason: format!(
                    "Sample count {} is not divisible by channel count {}",
                    samples.len(),
                    channels
                ),
                source: None,
            });
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Create a mono buffer; infallible for a non-zero rate
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: 1,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Create a silent buffer with the given duration
    pub fn silence(duration_secs: f32, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let num_samples = (duration_secs * sample_rate as f32) as usize * channels as usize;
        Self {
            samples: vec![0.0; num_samples],
            channels,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Get a reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get the number of channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of frames (samples per channel)
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds
    pub fn duration(&self) -> f32 {
        self.num_frames() as f32 / self.sample_rate as f32
    }

    /// Get samples for a specific channel (0-indexed)
    pub fn channel_samples(&self, channel: u16) -> Vec<f32> {
        if channel >= self.channels {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(channel as usize)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }

    /// Average all channels into a single mono signal
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_generation() {
        let buffer = AudioBuffer::silence(2.0, 2, 48000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.num_frames(), 96000);
        assert!(buffer.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_channel_extraction() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // L, R, L, R, L, R
        let buffer = AudioBuffer::new(samples, 2, 44100).unwrap();

        assert_eq!(buffer.channel_samples(0), vec![1.0, 3.0, 5.0]);
        assert_eq!(buffer.channel_samples(1), vec![2.0, 4.0, 6.0]);
        assert!(buffer.channel_samples(2).is_empty());
    }

    #[test]
    fn test_mono_mixdown() {
        let buffer = AudioBuffer::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 8000).unwrap();
        assert_eq!(buffer.to_mono(), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_empty_buffer_allowed() {
        let buffer = AudioBuffer::new(vec![], 1, 44100).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), 0.0);
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        let result = AudioBuffer::new(vec![0.0, 0.1, 0.2], 2, 44100);
        assert!(matches!(result, Err(RmfAudioError::InvalidAudio { .. })));
    }
}
