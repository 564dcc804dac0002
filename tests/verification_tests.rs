//! Audio Verification Tests
//!
//! Pitch extraction and comparison on synthesized audio, end to end through
//! WAV encoding and the device file layer.

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use rmfaudio::audio::{
    compare_buffers, compare_pitches, decode_audio, encode_wav, generate_chirp, generate_test_tone, AudioBuffer,
    PitchExtractor, PitchSeries,
};
use rmfaudio::remote::{compare_remote_audio, LocalFiles, RemoteFiles};
use rmfaudio::RmfAudioError;
use tempfile::tempdir;

#[test]
fn test_identical_sweeps_match() {
    let sweep = generate_chirp(110.0, 880.0, 2.0, 22050);
    let result = compare_buffers(&sweep, &sweep);

    assert!(result.matched);
    assert_abs_diff_eq!(result.correlation.unwrap(), 1.0, epsilon = 1e-9);
    assert_eq!(result.frames_compared, PitchExtractor::default().frame_count(sweep.num_frames()));
}

#[test]
fn test_tone_pitch_is_tracked() {
    let tone = generate_test_tone(440.0, 1.0, 22050);
    let series = PitchExtractor::default().extract(&tone);

    assert!(series.voiced_count() > series.len() / 2);
    assert_abs_diff_eq!(series.median_voiced().unwrap(), 440.0, epsilon = 5.0);
}

#[test]
fn test_silence_never_matches() {
    let silence = AudioBuffer::silence(1.0, 1, 22050);
    let series = PitchExtractor::default().extract(&silence);
    assert!(series.is_all_unvoiced());

    let result = compare_buffers(&silence, &silence);
    assert_eq!(result.correlation, None);
    assert!(!result.matched);
}

#[test]
fn test_only_common_frames_are_compared() {
    let reference = PitchSeries::new((0..100).map(|i| 200.0 + i as f32 * 3.0).collect());
    let candidate = PitchSeries::new((0..80).map(|i| 200.0 + i as f32 * 3.0).collect());

    let result = compare_pitches(&reference, &candidate);
    assert_eq!(result.frames_compared, 80);
    assert!(result.matched);
}

#[test]
fn test_stereo_16bit_capture_matches_mono_reference() {
    let reference = generate_chirp(200.0, 500.0, 1.5, 16000);
    let stereo: Vec<f32> = reference.samples().iter().flat_map(|&s| [s, s]).collect();
    let captured = AudioBuffer::new(stereo, 2, 16000).unwrap();

    let decoded = decode_audio(&encode_wav(&captured, 16).unwrap()).unwrap();
    assert_eq!(decoded.channels(), 2);
    assert!(compare_buffers(&reference, &decoded).matched);
}

#[test]
fn test_remote_comparison_over_local_files() {
    let device = tempdir().unwrap();
    let mut files = LocalFiles::new(device.path());
    let rising = generate_chirp(150.0, 600.0, 1.5, 16000);
    let falling = generate_chirp(600.0, 150.0, 1.5, 16000);
    files.write("/tmp/reference.wav", &encode_wav(&rising, 16).unwrap()).unwrap();
    files.write("/tmp/output_primary.wav", &encode_wav(&rising, 24).unwrap()).unwrap();
    files.write("/tmp/output_auxiliary.wav", &encode_wav(&falling, 16).unwrap()).unwrap();

    let same = compare_remote_audio(&mut files, "/tmp/reference.wav", "/tmp/output_primary.wav").unwrap();
    assert!(same.matched);

    let different = compare_remote_audio(&mut files, "/tmp/reference.wav", "/tmp/output_auxiliary.wav").unwrap();
    assert!(!different.matched);
    assert!(different.correlation.map_or(true, |score| score < 0.0));

    let missing = compare_remote_audio(&mut files, "/tmp/reference.wav", "/tmp/absent.wav").unwrap_err();
    assert!(matches!(missing, RmfAudioError::RemoteFileNotFound { .. }));
    assert!(missing.is_recoverable());
}
