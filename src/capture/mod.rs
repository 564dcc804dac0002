//! Capture Session Controller and its menu protocol
//!
//! - `session`: local state machine per capture type
//! - `protocol`: verbatim entry names and prompts of the device menu
//! - `parse`: telemetry extraction from menu responses
//! - `controller`: typed operations over the menu

pub mod controller;
pub mod parse;
pub mod protocol;
pub mod session;

pub use controller::{BytesReceived, CaptureController};
pub use parse::{parse_bytes_received, parse_jitter_result};
pub use session::{
    CaptureFormat, CaptureSession, CaptureSettings, CaptureState, CaptureType, JitterTest, Operation,
    SamplingRate, SettingsChange, TestType,
};
