//! YIN fundamental-frequency estimation
//!
//! Produces one estimate per analysis frame over the C2..C7 range. Frames
//! without a clear periodicity are reported as unvoiced (`NaN`).
//!
//! Framing is not centered: the first frame starts at sample 0 and a signal
//! shorter than one frame produces no frames at all.

use crate::audio::buffer::AudioBuffer;

/// C2 in Hz
pub const PITCH_FMIN_HZ: f32 = 65.406_39;

/// C7 in Hz
pub const PITCH_FMAX_HZ: f32 = 2093.004_5;

/// Analysis frame length in samples
pub const DEFAULT_FRAME_LENGTH: usize = 2048;

/// Cumulative-mean-normalized difference value a trough must fall below
pub const DEFAULT_TROUGH_THRESHOLD: f32 = 0.1;

/// YIN analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct YinConfig {
    pub fmin: f32,
    pub fmax: f32,
    pub frame_length: usize,
    /// Integration window, at most `frame_length - 1`
    pub win_length: usize,
    pub hop_length: usize,
    pub trough_threshold: f32,
}

impl Default for YinConfig {
    fn default() -> Self {
        YinConfig {
            fmin: PITCH_FMIN_HZ,
            fmax: PITCH_FMAX_HZ,
            frame_length: DEFAULT_FRAME_LENGTH,
            win_length: DEFAULT_FRAME_LENGTH / 2,
            hop_length: DEFAULT_FRAME_LENGTH / 4,
            trough_threshold: DEFAULT_TROUGH_THRESHOLD,
        }
    }
}

impl YinConfig {
    /// Lag search range `[min_period, max_period]` for a sample rate
    fn period_range(&self, sample_rate: u32) -> (usize, usize) {
        let sr = sample_rate as f32;
        let min_period = ((sr / self.fmax).floor() as usize).max(1);
        let max_period = ((sr / self.fmin).ceil() as usize)
            .min(self.frame_length.saturating_sub(self.win_length + 1));
        (min_period, max_period)
    }
}

/// Per-frame pitch estimates in Hz, `NaN` where unvoiced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PitchSeries {
    values: Vec<f32>,
}

impl PitchSeries {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of frames carrying a frequency estimate
    pub fn voiced_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn is_all_unvoiced(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }

    /// Median of the voiced frames
    pub fn median_voiced(&self) -> Option<f32> {
        let mut voiced: Vec<f32> = self.values.iter().copied().filter(|v| !v.is_nan()).collect();
        if voiced.is_empty() {
            return None;
        }
        voiced.sort_by(f32::total_cmp);
        Some(voiced[voiced.len() / 2])
    }

    /// Keep only the first `len` frames
    pub fn truncated(&self, len: usize) -> PitchSeries {
        PitchSeries {
            values: self.values[..len.min(self.values.len())].to_vec(),
        }
    }
}

/// YIN pitch tracker
#[derive(Debug, Clone, Default)]
pub struct PitchExtractor {
    config: YinConfig,
}

impl PitchExtractor {
    pub fn new(config: YinConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YinConfig {
        &self.config
    }

    /// Number of frames produced for a signal of `num_samples`
    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples < self.config.frame_length || self.config.hop_length == 0 {
            return 0;
        }
        1 + (num_samples - self.config.frame_length) / self.config.hop_length
    }

    /// Estimate pitch for a decoded buffer (channels are averaged first)
    pub fn extract(&self, buffer: &AudioBuffer) -> PitchSeries {
        self.extract_samples(&buffer.to_mono(), buffer.sample_rate())
    }

    /// Estimate pitch for a mono signal
    pub fn extract_samples(&self, samples: &[f32], sample_rate: u32) -> PitchSeries {
        let frames = self.frame_count(samples.len());
        let (min_period, max_period) = self.config.period_range(sample_rate);
        if frames == 0 || min_period >= max_period {
            return PitchSeries::default();
        }

        let mut diff = vec![0.0_f64; max_period + 1];
        let mut cmnd = vec![0.0_f64; max_period + 1];

        let values = (0..frames)
            .map(|index| {
                let start = index * self.config.hop_length;
                let frame = &samples[start..start + self.config.frame_length];
                difference_function(frame, self.config.win_length, &mut diff);
                cumulative_mean_normalize(&diff, &mut cmnd);
                self.pick_frequency(&cmnd, min_period, max_period, sample_rate)
            })
            .collect();

        PitchSeries { values }
    }

    fn pick_frequency(&self, cmnd: &[f64], min_period: usize, max_period: usize, sample_rate: u32) -> f32 {
        let threshold = self.config.trough_threshold as f64;
        let search = &cmnd[min_period..=max_period];

        let trough = (0..search.len()).find(|&i| search[i] < threshold && is_local_min(search, i));

        match trough {
            Some(i) => {
                let period = (min_period + i) as f64 + parabolic_shift(search, i);
                (sample_rate as f64 / period) as f32
            }
            None => f32::NAN,
        }
    }
}

/// Squared difference `d(tau)` between the window and its lagged copy
fn difference_function(frame: &[f32], win_length: usize, out: &mut [f64]) {
    for (tau, slot) in out.iter_mut().enumerate() {
        *slot = frame[..win_length]
            .iter()
            .zip(&frame[tau..tau + win_length])
            .map(|(&a, &b)| {
                let delta = a as f64 - b as f64;
                delta * delta
            })
            .sum();
    }
}

/// `d'(0) = 1`; where the running mean is zero the value is 1 as well
fn cumulative_mean_normalize(diff: &[f64], out: &mut [f64]) {
    out[0] = 1.0;
    let mut running = 0.0;
    for tau in 1..diff.len() {
        running += diff[tau];
        out[tau] = if running > f64::EPSILON {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }
}

/// Strict on the left, non-strict on the right; edges compare to their only neighbour
fn is_local_min(values: &[f64], i: usize) -> bool {
    let left_ok = i == 0 || values[i] < values[i - 1];
    let right_ok = i + 1 >= values.len() || values[i] <= values[i + 1];
    left_ok && right_ok
}

fn parabolic_shift(values: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let a = values[i + 1] + values[i - 1] - 2.0 * values[i];
    let b = (values[i + 1] - values[i - 1]) / 2.0;
    if b.abs() >= a.abs() {
        0.0
    } else {
        -b / a
    }
}
