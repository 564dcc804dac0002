//! Device access: interactive consoles, file transfer, audio fetch

pub mod console;
pub mod fetch;
pub mod files;
#[cfg(feature = "ssh")]
pub mod ssh;

use serde::{Deserialize, Serialize};

pub use console::{Console, MarkerBuffer, ProcessConsole};
pub use fetch::{compare_remote_audio, fetch_audio, fetch_audio_pair, FetchedPair};
pub use files::{LocalFiles, RemoteFiles};

/// Where and how to log in to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    22
}

/// Fetch and decode both files over a fresh SSH session
#[cfg(feature = "ssh")]
pub fn fetch_audio_pair_over_ssh(params: &ConnectionParams, reference: &str, candidate: &str) -> crate::error::Result<FetchedPair> {
    ssh::with_remote_files(params, |files| fetch_audio_pair(files, reference, candidate))
}
