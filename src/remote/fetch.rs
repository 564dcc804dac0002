//! Remote Audio Fetcher
//!
//! Pulls a reference stream and a captured output off the device and
//! decodes both. A missing file, a transfer failure, or undecodable
//! content is always an error; nothing is substituted.

use crate::audio::{compare_buffers, decode_audio, AudioBuffer, ComparisonResult};
use crate::error::Result;
use crate::remote::files::RemoteFiles;

/// Decoded reference and candidate audio
#[derive(Debug, Clone)]
pub struct FetchedPair {
    pub reference: AudioBuffer,
    pub candidate: AudioBuffer,
}

/// Read and decode one device file
pub fn fetch_audio<F: RemoteFiles + ?Sized>(files: &mut F, path: &str) -> Result<AudioBuffer> {
    let bytes = files.read(path)?;
    log::debug!("Fetched {} ({} bytes)", path, bytes.len());
    decode_audio(&bytes)
}

/// Fetch both files of a comparison
pub fn fetch_audio_pair<F: RemoteFiles + ?Sized>(files: &mut F, reference: &str, candidate: &str) -> Result<FetchedPair> {
    let reference_audio = fetch_audio(files, reference)?;
    let candidate_audio = fetch_audio(files, candidate)?;
    log::info!(
        "Fetched {} ({:.2} s) and {} ({:.2} s)",
        reference,
        reference_audio.duration(),
        candidate,
        candidate_audio.duration()
    );
    Ok(FetchedPair {
        reference: reference_audio,
        candidate: candidate_audio,
    })
}

/// Fetch both files and compare their pitch tracks
pub fn compare_remote_audio<F: RemoteFiles + ?Sized>(
    files: &mut F,
    reference: &str,
    candidate: &str,
) -> Result<ComparisonResult> {
    let pair = fetch_audio_pair(files, reference, candidate)?;
    Ok(compare_buffers(&pair.reference, &pair.candidate))
}
