//! Capture session model
//!
//! One [`CaptureSession`] per capture type mirrors what the device menu
//! holds for that handle. The local state machine is authoritative:
//! operations are validated here before anything is sent to the device.
//!
//! ```text
//! Closed -open-> Idle -configure*-> Idle -select-> Ready -start-> Capturing
//!                                     Ready <-stop- Capturing
//! Idle/Ready -close-> Closed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RmfAudioError};

/// Audio input interface addressed by a menu command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureType {
    Primary,
    Auxiliary,
}

impl CaptureType {
    pub const ALL: [CaptureType; 2] = [CaptureType::Primary, CaptureType::Auxiliary];

    /// Value typed at the "Select the audio capture type" prompt
    pub fn menu_value(self) -> u8 {
        match self {
            CaptureType::Primary => 1,
            CaptureType::Auxiliary => 2,
        }
    }

    pub fn from_menu_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(CaptureType::Primary),
            2 => Some(CaptureType::Auxiliary),
            _ => None,
        }
    }

    /// Label used by the device in telemetry lines
    pub fn label(self) -> &'static str {
        match self {
            CaptureType::Primary => "Primary",
            CaptureType::Auxiliary => "Auxiliary",
        }
    }
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureType::Primary => write!(f, "primary"),
            CaptureType::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// What the device does with captured buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    /// Only count bytes delivered by the data callback
    ByteCounting,
    /// Keep the audio so it can be written to a wav file
    DataCapture,
}

impl TestType {
    pub fn menu_value(self) -> u8 {
        match self {
            TestType::ByteCounting => 1,
            TestType::DataCapture => 2,
        }
    }

    pub fn from_menu_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(TestType::ByteCounting),
            2 => Some(TestType::DataCapture),
            _ => None,
        }
    }
}

/// racFormat values, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureFormat {
    #[default]
    Stereo16Bit,
    Stereo24Bit,
    MonoLeft16Bit,
    MonoRight16Bit,
    Mono16Bit,
    Surround24Bit,
}

impl CaptureFormat {
    const ORDER: [CaptureFormat; 6] = [
        CaptureFormat::Stereo16Bit,
        CaptureFormat::Stereo24Bit,
        CaptureFormat::MonoLeft16Bit,
        CaptureFormat::MonoRight16Bit,
        CaptureFormat::Mono16Bit,
        CaptureFormat::Surround24Bit,
    ];

    pub fn menu_value(self) -> u8 {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0) as u8
    }

    pub fn from_menu_value(value: u8) -> Option<Self> {
        Self::ORDER.get(value as usize).copied()
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            CaptureFormat::Stereo24Bit | CaptureFormat::Surround24Bit => 24,
            _ => 16,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            CaptureFormat::Stereo16Bit | CaptureFormat::Stereo24Bit => 2,
            CaptureFormat::MonoLeft16Bit | CaptureFormat::MonoRight16Bit | CaptureFormat::Mono16Bit => 1,
            CaptureFormat::Surround24Bit => 6,
        }
    }
}

/// racFreq values, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingRate {
    Hz16000,
    Hz22050,
    Hz24000,
    Hz32000,
    Hz44100,
    #[default]
    Hz48000,
}

impl SamplingRate {
    const ORDER: [SamplingRate; 6] = [
        SamplingRate::Hz16000,
        SamplingRate::Hz22050,
        SamplingRate::Hz24000,
        SamplingRate::Hz32000,
        SamplingRate::Hz44100,
        SamplingRate::Hz48000,
    ];

    pub fn menu_value(self) -> u8 {
        Self::ORDER.iter().position(|r| *r == self).unwrap_or(0) as u8
    }

    pub fn from_menu_value(value: u8) -> Option<Self> {
        Self::ORDER.get(value as usize).copied()
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ORDER.iter().copied().find(|r| r.hz() == hz)
    }

    pub fn hz(self) -> u32 {
        match self {
            SamplingRate::Hz16000 => 16000,
            SamplingRate::Hz22050 => 22050,
            SamplingRate::Hz24000 => 24000,
            SamplingRate::Hz32000 => 32000,
            SamplingRate::Hz44100 => 44100,
            SamplingRate::Hz48000 => 48000,
        }
    }
}

/// Settings the device applies when capture starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub format: CaptureFormat,
    pub sampling_rate: SamplingRate,
    /// FIFO size in bytes
    pub fifo_size: u32,
    /// Data callback threshold in bytes
    pub threshold: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        CaptureSettings {
            format: CaptureFormat::Stereo16Bit,
            sampling_rate: SamplingRate::Hz48000,
            fifo_size: 65536,
            threshold: 8192,
        }
    }
}

impl CaptureSettings {
    /// Bytes per second delivered at these settings
    pub fn byte_rate(&self) -> u64 {
        self.sampling_rate.hz() as u64
            * self.format.channels() as u64
            * self.format.bits_per_sample() as u64
            / 8
    }

    pub fn expected_bytes(&self, seconds: f64) -> u64 {
        (self.byte_rate() as f64 * seconds) as u64
    }

    /// Whether `actual` is within 90%..110% of the bytes expected for `seconds`
    pub fn delivery_within_tolerance(&self, actual: u64, seconds: f64) -> bool {
        let expected = self.expected_bytes(seconds);
        if expected == 0 {
            return false;
        }
        let percentage = actual as f64 / expected as f64 * 100.0;
        percentage > 90.0 && percentage < 110.0
    }

    /// The callback threshold must not exceed a quarter of the FIFO
    pub fn threshold_within_guidance(&self) -> bool {
        self.threshold <= self.fifo_size / 4
    }
}

/// Requested changes to the current settings; `None` keeps the current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    pub format: Option<CaptureFormat>,
    pub sampling_rate: Option<SamplingRate>,
    pub fifo_size: Option<u32>,
    pub threshold: Option<u32>,
}

impl SettingsChange {
    pub fn apply_to(&self, settings: &CaptureSettings) -> CaptureSettings {
        CaptureSettings {
            format: self.format.unwrap_or(settings.format),
            sampling_rate: self.sampling_rate.unwrap_or(settings.sampling_rate),
            fifo_size: self.fifo_size.unwrap_or(settings.fifo_size),
            threshold: self.threshold.unwrap_or(settings.threshold),
        }
    }
}

/// Parameters of the device-side jitter monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterTest {
    /// Minimum bytes expected per interval
    pub threshold: u32,
    pub interval_us: u64,
    pub duration_secs: u64,
}

impl Default for JitterTest {
    fn default() -> Self {
        JitterTest {
            threshold: 16384,
            interval_us: 100_000,
            duration_secs: 120,
        }
    }
}

/// Lifecycle state of one capture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Closed,
    /// Handle open, test type not yet selected
    Idle,
    Ready,
    Capturing,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Closed => write!(f, "closed"),
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::Ready => write!(f, "ready"),
            CaptureState::Capturing => write!(f, "capturing"),
        }
    }
}

/// Menu operations addressed at a single capture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Close,
    UpdateSettings,
    SelectTestType,
    Start,
    Stop,
    WriteWav,
    StartJitter,
    CheckJitter,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Open => "open handle",
            Operation::Close => "close handle",
            Operation::UpdateSettings => "update settings",
            Operation::SelectTestType => "select test type",
            Operation::Start => "start capture",
            Operation::Stop => "stop capture",
            Operation::WriteWav => "write wav file",
            Operation::StartJitter => "start jitter test",
            Operation::CheckJitter => "check jitter result",
        }
    }

    fn allowed_in(self) -> &'static [CaptureState] {
        use CaptureState::*;
        match self {
            Operation::Open => &[Closed],
            Operation::Close => &[Idle, Ready],
            Operation::UpdateSettings | Operation::SelectTestType => &[Idle, Ready],
            Operation::Start => &[Ready],
            Operation::Stop => &[Capturing],
            Operation::WriteWav => &[Ready, Capturing],
            Operation::StartJitter => &[Capturing],
            Operation::CheckJitter => &[Ready, Capturing],
        }
    }
}

/// Local mirror of one capture handle on the device
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    capture_type: CaptureType,
    state: CaptureState,
    settings: CaptureSettings,
    test_type: Option<TestType>,
    capture_duration_secs: Option<u32>,
    bytes_received: Option<u64>,
    /// First counter seen after the last stop
    frozen_bytes: Option<u64>,
    jitter_test: Option<JitterTest>,
    jitter_passed: Option<bool>,
}

impl CaptureSession {
    pub fn new(capture_type: CaptureType) -> Self {
        Self {
            capture_type,
            state: CaptureState::Closed,
            settings: CaptureSettings::default(),
            test_type: None,
            capture_duration_secs: None,
            bytes_received: None,
            frozen_bytes: None,
            jitter_test: None,
            jitter_passed: None,
        }
    }

    pub fn capture_type(&self) -> CaptureType {
        self.capture_type
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn test_type(&self) -> Option<TestType> {
        self.test_type
    }

    pub fn capture_duration_secs(&self) -> Option<u32> {
        self.capture_duration_secs
    }

    pub fn bytes_received(&self) -> Option<u64> {
        self.bytes_received
    }

    pub fn jitter_test(&self) -> Option<&JitterTest> {
        self.jitter_test.as_ref()
    }

    pub fn jitter_passed(&self) -> Option<bool> {
        self.jitter_passed
    }

    pub fn is_open(&self) -> bool {
        self.state != CaptureState::Closed
    }

    /// Reject an operation the current state does not allow
    pub fn validate(&self, operation: Operation) -> Result<()> {
        if !operation.allowed_in().contains(&self.state) {
            return Err(RmfAudioError::InvalidTransition {
                capture_type: self.capture_type,
                state: self.state,
                operation: operation.name(),
            });
        }
        if operation == Operation::CheckJitter && self.jitter_test.is_none() {
            return Err(RmfAudioError::InvalidTransition {
                capture_type: self.capture_type,
                state: self.state,
                operation: "check jitter result without a running jitter test",
            });
        }
        Ok(())
    }

    pub(crate) fn mark_open(&mut self) {
        *self = CaptureSession::new(self.capture_type);
        self.state = CaptureState::Idle;
    }

    pub(crate) fn mark_closed(&mut self) {
        *self = CaptureSession::new(self.capture_type);
    }

    pub(crate) fn apply_settings(&mut self, settings: CaptureSettings) {
        self.settings = settings;
    }

    pub(crate) fn mark_ready(&mut self, test_type: TestType, duration_secs: Option<u32>) {
        self.test_type = Some(test_type);
        self.capture_duration_secs = duration_secs;
        self.state = CaptureState::Ready;
    }

    /// A new capture run restarts the device counter
    pub(crate) fn mark_capturing(&mut self) {
        self.state = CaptureState::Capturing;
        self.bytes_received = None;
        self.frozen_bytes = None;
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.state = CaptureState::Ready;
        self.frozen_bytes = None;
    }

    pub(crate) fn mark_jitter_started(&mut self, test: JitterTest) {
        self.jitter_test = Some(test);
        self.jitter_passed = None;
    }

    pub(crate) fn record_jitter_result(&mut self, passed: bool) {
        self.jitter_passed = Some(passed);
    }

    /// Record a counter reading; returns false when it breaks the counter invariant
    ///
    /// Counters never decrease, and a stopped session's counter must hold the
    /// value first observed after the stop.
    pub(crate) fn observe_bytes(&mut self, bytes: u64) -> bool {
        let mut consistent = true;
        if let Some(previous) = self.bytes_received {
            if bytes < previous {
                log::warn!(
                    "{} capture counter went backwards: {} -> {}",
                    self.capture_type,
                    previous,
                    bytes
                );
                consistent = false;
            }
        }
        if self.state != CaptureState::Capturing {
            match self.frozen_bytes {
                None => self.frozen_bytes = Some(bytes),
                Some(frozen) if frozen != bytes => {
                    log::warn!(
                        "{} capture counter moved while {}: {} -> {}",
                        self.capture_type,
                        self.state,
                        frozen,
                        bytes
                    );
                    consistent = false;
                }
                Some(_) => {}
            }
        }
        self.bytes_received = Some(bytes);
        consistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_values() {
        assert_eq!(CaptureType::Primary.menu_value(), 1);
        assert_eq!(CaptureType::Auxiliary.menu_value(), 2);
        assert_eq!(CaptureType::from_menu_value(3), None);
        assert_eq!(CaptureFormat::Stereo16Bit.menu_value(), 0);
        assert_eq!(CaptureFormat::from_menu_value(5), Some(CaptureFormat::Surround24Bit));
        assert_eq!(SamplingRate::Hz48000.menu_value(), 5);
        assert_eq!(SamplingRate::from_hz(22050), Some(SamplingRate::Hz22050));
        assert_eq!(TestType::DataCapture.menu_value(), 2);
    }

    #[test]
    fn test_default_settings_byte_rate() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.byte_rate(), 192_000);
        assert_eq!(settings.expected_bytes(10.0), 1_920_000);
        assert!(settings.threshold_within_guidance());
        assert!(settings.delivery_within_tolerance(1_900_000, 10.0));
        assert!(!settings.delivery_within_tolerance(1_000_000, 10.0));
    }

    #[test]
    fn test_settings_change_keeps_unset_values() {
        let change = SettingsChange {
            fifo_size: Some(16384),
            ..SettingsChange::default()
        };
        let updated = change.apply_to(&CaptureSettings::default());
        assert_eq!(updated.fifo_size, 16384);
        assert_eq!(updated.threshold, 8192);
        assert_eq!(updated.sampling_rate, SamplingRate::Hz48000);
        assert!(!updated.threshold_within_guidance());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = CaptureSession::new(CaptureType::Primary);
        assert!(session.validate(Operation::Start).is_err());
        session.validate(Operation::Open).unwrap();
        session.mark_open();

        assert!(session.validate(Operation::Start).is_err());
        session.validate(Operation::SelectTestType).unwrap();
        session.mark_ready(TestType::ByteCounting, None);

        session.validate(Operation::Start).unwrap();
        session.mark_capturing();
        assert!(session.validate(Operation::Close).is_err());
        assert!(session.validate(Operation::CheckJitter).is_err());
        session.validate(Operation::StartJitter).unwrap();

        session.mark_stopped();
        assert_eq!(session.state(), CaptureState::Ready);
        session.validate(Operation::Close).unwrap();
        session.mark_closed();
        assert!(!session.is_open());
    }

    #[test]
    fn test_counter_invariant() {
        let mut session = CaptureSession::new(CaptureType::Auxiliary);
        session.mark_open();
        session.mark_ready(TestType::ByteCounting, None);
        session.mark_capturing();

        assert!(session.observe_bytes(100));
        assert!(session.observe_bytes(400));
        assert!(!session.observe_bytes(300));

        session.mark_stopped();
        assert!(session.observe_bytes(500));
        assert!(session.observe_bytes(500));
        assert!(!session.observe_bytes(600));
    }
}
