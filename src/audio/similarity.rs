//! Pitch-track similarity
//!
//! Two pitch series are truncated to the shorter length and compared with
//! the Pearson correlation coefficient. Unvoiced frames (`NaN`) are ordinary
//! values: a single one makes the coefficient undefined, and an undefined
//! coefficient is always a failed match.

use num_traits::Float;

use crate::audio::pitch::PitchSeries;

/// Minimum correlation for two pitch tracks to be considered the same audio
pub const MATCH_THRESHOLD: f64 = 0.95;

/// Outcome of comparing a captured pitch track against its reference
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub matched: bool,
    /// `None` when the coefficient is undefined
    pub correlation: Option<f64>,
    pub frames_compared: usize,
}

impl ComparisonResult {
    pub fn summary(&self) -> String {
        match self.correlation {
            Some(score) if self.matched => {
                format!("The audio files match with a correlation of {:.2}", score)
            }
            Some(score) => format!("The audio files do not match (correlation: {:.2})", score),
            None => format!(
                "The audio files do not match (correlation undefined over {} frames)",
                self.frames_compared
            ),
        }
    }
}

/// Pearson correlation coefficient of two equally long sequences
///
/// Returns `None` for fewer than two points, zero variance, or a
/// non-finite result (which includes any `NaN` input).
pub fn pearson<T: Float>(xs: &[T], ys: &[T]) -> Option<T> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let count = T::from(n)?;

    let mean_x = xs.iter().fold(T::zero(), |acc, &x| acc + x) / count;
    let mean_y = ys.iter().fold(T::zero(), |acc, &y| acc + y) / count;

    let (mut cov, mut var_x, mut var_y) = (T::zero(), T::zero(), T::zero());
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov = cov + dx * dy;
        var_x = var_x + dx * dx;
        var_y = var_y + dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if !denominator.is_finite() || denominator <= T::zero() {
        return None;
    }
    let r = cov / denominator;
    if !r.is_finite() {
        return None;
    }
    Some(r.max(-T::one()).min(T::one()))
}

/// Inclusive threshold check
pub fn is_match(score: f64) -> bool {
    score >= MATCH_THRESHOLD
}

/// Compare two pitch series frame by frame over their common prefix
pub fn compare_pitches(reference: &PitchSeries, candidate: &PitchSeries) -> ComparisonResult {
    let frames = reference.len().min(candidate.len());
    let xs: Vec<f64> = reference.values()[..frames].iter().map(|&v| v as f64).collect();
    let ys: Vec<f64> = candidate.values()[..frames].iter().map(|&v| v as f64).collect();

    let correlation = pearson(&xs, &ys);
    ComparisonResult {
        matched: correlation.map(is_match).unwrap_or(false),
        correlation,
        frames_compared: frames,
    }
}
