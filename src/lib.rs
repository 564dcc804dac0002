//! RMF Audio Capture L3 verification suite
//!
//! Drives the audio capture HAL's on-device test menu and verifies what it
//! captured:
//! 1. Capture control - typed, state-checked operations over the text menu
//! 2. Audio verification - YIN pitch tracks compared by Pearson correlation
//!
//! # Architecture
//!
//! - `menu`: CUnit console navigation (and a simulated device for tests)
//! - `capture`: capture sessions, menu protocol and telemetry parsing
//! - `remote`: consoles, file transfer and fetching of captured audio
//! - `audio`: decoding, pitch extraction, similarity scoring
//! - `suite`: configuration-driven test cases and reporting

pub mod audio;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod menu;
pub mod remote;
pub mod suite;

pub use error::{Result, RmfAudioError};
