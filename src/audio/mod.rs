//! Audio verification pipeline
//!
//! - Decoding of captured/reference streams (WAV via hound)
//! - YIN pitch extraction
//! - Pitch-track correlation with a fixed pass threshold

pub mod buffer;
pub mod io;
pub mod pitch;
pub mod similarity;

pub use buffer::AudioBuffer;
pub use io::{
    decode_audio, encode_wav, generate_chirp, generate_test_tone, load_wav, save_wav,
    ContainerKind,
};
pub use pitch::{PitchExtractor, PitchSeries, YinConfig};
pub use similarity::{compare_pitches, pearson, ComparisonResult, MATCH_THRESHOLD};

/// Run the full pitch comparison on two decoded buffers
///
/// A sample-rate mismatch is logged but not corrected; frame alignment then
/// compares different time spans.
pub fn compare_buffers(reference: &AudioBuffer, candidate: &AudioBuffer) -> ComparisonResult {
    if reference.sample_rate() != candidate.sample_rate() {
        log::warn!(
            "Comparing audio at different rates ({} Hz vs {} Hz); frames cover different time spans",
            reference.sample_rate(),
            candidate.sample_rate()
        );
    }

    let extractor = PitchExtractor::default();
    let reference_pitch = extractor.extract(reference);
    let candidate_pitch = extractor.extract(candidate);
    let result = compare_pitches(&reference_pitch, &candidate_pitch);

    log::info!("{}", result.summary());
    result
}
