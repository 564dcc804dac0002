//! Capture Session Controller
//!
//! Typed operations over the device's L3 capture menu. Every call is
//! checked against the local [`CaptureSession`] first; a rejected call
//! never reaches the device.

use crate::capture::parse::{parse_bytes_received, parse_jitter_result};
use crate::capture::protocol::{entries, prompts, RETAIN_DEFAULT, SUITE_NAME};
use crate::capture::session::{
    CaptureSession, CaptureSettings, CaptureType, JitterTest, Operation, SettingsChange, TestType,
};
use crate::config::DeviceProfile;
use crate::error::Result;
use crate::menu::{MenuNavigator, PromptAnswer};

/// Counters reported by "Check Bytes Received"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BytesReceived {
    pub primary: Option<u64>,
    pub auxiliary: Option<u64>,
}

impl BytesReceived {
    pub fn get(&self, capture_type: CaptureType) -> Option<u64> {
        match capture_type {
            CaptureType::Primary => self.primary,
            CaptureType::Auxiliary => self.auxiliary,
        }
    }
}

/// Drives the capture menu for both capture types
pub struct CaptureController<N: MenuNavigator> {
    menu: N,
    suite: String,
    aux_supported: bool,
    primary: CaptureSession,
    auxiliary: CaptureSession,
}

impl<N: MenuNavigator> CaptureController<N> {
    pub fn new(menu: N, profile: &DeviceProfile) -> Self {
        Self {
            menu,
            suite: SUITE_NAME.to_string(),
            aux_supported: profile.aux_supported(),
            primary: CaptureSession::new(CaptureType::Primary),
            auxiliary: CaptureSession::new(CaptureType::Auxiliary),
        }
    }

    /// Use a differently named suite on the device
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = suite.into();
        self
    }

    /// Whether the device profile declares auxiliary capture
    pub fn check_auxiliary_support(&self) -> bool {
        self.aux_supported
    }

    pub fn session(&self, capture_type: CaptureType) -> &CaptureSession {
        match capture_type {
            CaptureType::Primary => &self.primary,
            CaptureType::Auxiliary => &self.auxiliary,
        }
    }

    fn session_mut(&mut self, capture_type: CaptureType) -> &mut CaptureSession {
        match capture_type {
            CaptureType::Primary => &mut self.primary,
            CaptureType::Auxiliary => &mut self.auxiliary,
        }
    }

    pub fn menu_mut(&mut self) -> &mut N {
        &mut self.menu
    }

    fn run(&mut self, entry: &str, prompts: &[PromptAnswer]) -> Result<String> {
        let suite = self.suite.clone();
        self.menu.select(&suite, entry, prompts)
    }

    fn capture_type_answer(capture_type: CaptureType) -> PromptAnswer {
        PromptAnswer::new(prompts::CAPTURE_TYPE, capture_type.menu_value())
    }

    // ========================================================================
    // Handle lifecycle
    // ========================================================================

    pub fn open_handle(&mut self, capture_type: CaptureType) -> Result<()> {
        self.session(capture_type).validate(Operation::Open)?;
        if capture_type == CaptureType::Auxiliary && !self.aux_supported {
            log::warn!("Opening auxiliary capture on a device profile without auxsupport");
        }
        self.run(entries::OPEN_HANDLE, &[Self::capture_type_answer(capture_type)])?;
        self.session_mut(capture_type).mark_open();
        log::info!("Opened {} capture handle", capture_type);
        Ok(())
    }

    pub fn close_handle(&mut self, capture_type: CaptureType) -> Result<()> {
        self.session(capture_type).validate(Operation::Close)?;
        self.run(entries::CLOSE_HANDLE, &[Self::capture_type_answer(capture_type)])?;
        self.session_mut(capture_type).mark_closed();
        log::info!("Closed {} capture handle", capture_type);
        Ok(())
    }

    /// Change capture settings; `None` answers "no" and keeps the current settings
    ///
    /// A callback threshold above a quarter of the FIFO is sent anyway and
    /// only logged.
    pub fn update_settings(&mut self, capture_type: CaptureType, change: Option<SettingsChange>) -> Result<CaptureSettings> {
        self.session(capture_type).validate(Operation::UpdateSettings)?;

        let mut answers = vec![Self::capture_type_answer(capture_type)];
        let settings = match change {
            None => {
                answers.push(PromptAnswer::new(prompts::UPDATE_DEFAULTS, 0));
                *self.session(capture_type).settings()
            }
            Some(change) => {
                answers.push(PromptAnswer::new(prompts::UPDATE_DEFAULTS, 1));
                answers.push(retain_or(prompts::FORMAT, change.format.map(|f| f.menu_value())));
                answers.push(retain_or(
                    prompts::SAMPLING_RATE,
                    change.sampling_rate.map(|r| r.menu_value()),
                ));
                answers.push(retain_or(prompts::FIFO_SIZE, change.fifo_size));
                answers.push(retain_or(prompts::THRESHOLD, change.threshold));
                change.apply_to(self.session(capture_type).settings())
            }
        };

        if !settings.threshold_within_guidance() {
            log::warn!(
                "{} capture threshold {} exceeds 1/4 of FIFO size {}",
                capture_type,
                settings.threshold,
                settings.fifo_size
            );
        }

        self.run(entries::UPDATE_SETTINGS, &answers)?;
        self.session_mut(capture_type).apply_settings(settings);
        Ok(settings)
    }

    /// Choose byte counting or data capture; the duration is only sent for data capture
    pub fn select_test_type(&mut self, capture_type: CaptureType, test_type: TestType, duration_secs: u32) -> Result<()> {
        self.session(capture_type).validate(Operation::SelectTestType)?;

        let mut answers = vec![
            Self::capture_type_answer(capture_type),
            PromptAnswer::new(prompts::TEST_TYPE, test_type.menu_value()),
        ];
        let duration = match test_type {
            TestType::DataCapture => {
                answers.push(PromptAnswer::new(prompts::CAPTURE_DURATION, duration_secs));
                Some(duration_secs)
            }
            TestType::ByteCounting => None,
        };

        self.run(entries::SELECT_TEST_TYPE, &answers)?;
        self.session_mut(capture_type).mark_ready(test_type, duration);
        Ok(())
    }

    // ========================================================================
    // Capture
    // ========================================================================

    pub fn start_capture(&mut self, capture_type: CaptureType) -> Result<()> {
        self.session(capture_type).validate(Operation::Start)?;
        self.run(entries::START_CAPTURE, &[Self::capture_type_answer(capture_type)])?;
        self.session_mut(capture_type).mark_capturing();
        log::info!("Started {} capture", capture_type);
        Ok(())
    }

    pub fn stop_capture(&mut self, capture_type: CaptureType) -> Result<()> {
        self.session(capture_type).validate(Operation::Stop)?;
        self.run(entries::STOP_CAPTURE, &[Self::capture_type_answer(capture_type)])?;
        self.session_mut(capture_type).mark_stopped();
        log::info!("Stopped {} capture", capture_type);
        Ok(())
    }

    /// Read both byte counters
    ///
    /// Missing telemetry gives `None` counters; only transport failures are errors.
    pub fn check_bytes_received(&mut self) -> Result<BytesReceived> {
        let output = self.run(entries::CHECK_BYTES_RECEIVED, &[])?;
        let (primary, auxiliary) = parse_bytes_received(&output);
        let received = BytesReceived { primary, auxiliary };

        for capture_type in CaptureType::ALL {
            if let Some(bytes) = received.get(capture_type) {
                self.session_mut(capture_type).observe_bytes(bytes);
            }
        }
        if primary.is_none() {
            log::warn!("No byte counters found in response");
        } else {
            log::info!("Bytes received: primary {:?}, auxiliary {:?}", primary, auxiliary);
        }
        Ok(received)
    }

    pub fn write_wav_file(&mut self, capture_type: CaptureType, file_path: &str) -> Result<()> {
        self.session(capture_type).validate(Operation::WriteWav)?;
        if self.session(capture_type).test_type() != Some(TestType::DataCapture) {
            log::warn!("Writing {} output without a data capture test selected", capture_type);
        }
        self.run(
            entries::WRITE_WAV,
            &[
                Self::capture_type_answer(capture_type),
                PromptAnswer::new(prompts::OUTPUT_FILE, file_path),
            ],
        )?;
        log::info!("Requested {} output at {}", capture_type, file_path);
        Ok(())
    }

    // ========================================================================
    // Jitter
    // ========================================================================

    pub fn start_jitter_test(&mut self, capture_type: CaptureType, test: JitterTest) -> Result<()> {
        self.session(capture_type).validate(Operation::StartJitter)?;
        self.run(
            entries::START_JITTER_TEST,
            &[
                Self::capture_type_answer(capture_type),
                PromptAnswer::new(prompts::JITTER_THRESHOLD, test.threshold),
                PromptAnswer::new(prompts::JITTER_INTERVAL, test.interval_us),
                PromptAnswer::new(prompts::JITTER_DURATION, test.duration_secs),
            ],
        )?;
        self.session_mut(capture_type).mark_jitter_started(test);
        log::info!(
            "Started {} jitter monitor: {} bytes per {} us for {} s",
            capture_type,
            test.threshold,
            test.interval_us,
            test.duration_secs
        );
        Ok(())
    }

    /// True when the device reported no jitter
    pub fn check_jitter_test_result(&mut self, capture_type: CaptureType) -> Result<bool> {
        self.session(capture_type).validate(Operation::CheckJitter)?;
        let output = self.run(entries::CHECK_JITTER_RESULT, &[Self::capture_type_answer(capture_type)])?;
        let passed = parse_jitter_result(&output);
        self.session_mut(capture_type).record_jitter_result(passed);
        if passed {
            log::info!("No jitter on {} capture", capture_type);
        } else {
            log::warn!("Jitter detected on {} capture", capture_type);
        }
        Ok(passed)
    }
}

fn retain_or<T: ToString>(query: &str, value: Option<T>) -> PromptAnswer {
    match value {
        Some(value) => PromptAnswer::new(query, value),
        None => PromptAnswer::new(query, RETAIN_DEFAULT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureState, SamplingRate};
    use crate::error::RmfAudioError;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Records selections and replies with canned output
    #[derive(Default)]
    struct RecordingMenu {
        calls: Vec<(String, String, Vec<PromptAnswer>)>,
        replies: VecDeque<String>,
    }

    impl MenuNavigator for RecordingMenu {
        fn select(&mut self, suite: &str, test: &str, prompts: &[PromptAnswer]) -> Result<String> {
            self.calls.push((suite.to_string(), test.to_string(), prompts.to_vec()));
            Ok(self.replies.pop_front().unwrap_or_default())
        }
    }

    fn controller(aux: bool) -> CaptureController<RecordingMenu> {
        CaptureController::new(RecordingMenu::default(), &DeviceProfile::with_aux_support(aux))
    }

    fn inputs(call: &(String, String, Vec<PromptAnswer>)) -> Vec<&str> {
        call.2.iter().map(|p| p.input.as_str()).collect()
    }

    #[test]
    fn test_start_before_open_is_rejected_locally() {
        let mut controller = controller(true);
        let err = controller.start_capture(CaptureType::Auxiliary).unwrap_err();
        assert!(matches!(
            err,
            RmfAudioError::InvalidTransition {
                state: CaptureState::Closed,
                ..
            }
        ));
        assert!(controller.menu_mut().calls.is_empty());
    }

    #[test]
    fn test_full_lifecycle_sends_expected_prompts() {
        let mut controller = controller(false);
        let primary = CaptureType::Primary;

        controller.open_handle(primary).unwrap();
        controller.update_settings(primary, None).unwrap();
        controller.select_test_type(primary, TestType::DataCapture, 10).unwrap();
        controller.start_capture(primary).unwrap();
        controller.write_wav_file(primary, "/tmp/output_primary.wav").unwrap();
        controller.stop_capture(primary).unwrap();
        controller.close_handle(primary).unwrap();

        let calls = &controller.menu_mut().calls;
        let tests: Vec<&str> = calls.iter().map(|c| c.1.as_str()).collect();
        assert_eq!(
            tests,
            vec![
                entries::OPEN_HANDLE,
                entries::UPDATE_SETTINGS,
                entries::SELECT_TEST_TYPE,
                entries::START_CAPTURE,
                entries::WRITE_WAV,
                entries::STOP_CAPTURE,
                entries::CLOSE_HANDLE,
            ]
        );
        assert!(calls.iter().all(|c| c.0 == SUITE_NAME));
        assert_eq!(inputs(&calls[1]), vec!["1", "0"]);
        assert_eq!(inputs(&calls[2]), vec!["1", "2", "10"]);
        assert_eq!(inputs(&calls[4]), vec!["1", "/tmp/output_primary.wav"]);
        assert_eq!(controller.session(primary).state(), CaptureState::Closed);
    }

    #[test]
    fn test_byte_counting_omits_duration_prompt() {
        let mut controller = controller(true);
        controller.open_handle(CaptureType::Auxiliary).unwrap();
        controller.select_test_type(CaptureType::Auxiliary, TestType::ByteCounting, 10).unwrap();
        let call = controller.menu_mut().calls.last().cloned().unwrap();
        assert_eq!(inputs(&call), vec!["2", "1"]);
    }

    #[test]
    fn test_settings_change_uses_retain_marker() {
        let mut controller = controller(false);
        controller.open_handle(CaptureType::Primary).unwrap();
        let change = SettingsChange {
            sampling_rate: Some(SamplingRate::Hz44100),
            threshold: Some(32768),
            ..SettingsChange::default()
        };
        let settings = controller.update_settings(CaptureType::Primary, Some(change)).unwrap();

        assert_eq!(settings.sampling_rate, SamplingRate::Hz44100);
        assert!(!settings.threshold_within_guidance());
        let call = controller.menu_mut().calls.last().cloned().unwrap();
        assert_eq!(inputs(&call), vec!["1", "1", "-1", "4", "-1", "32768"]);
    }

    #[test]
    fn test_declining_update_keeps_earlier_change() {
        let mut controller = controller(false);
        let primary = CaptureType::Primary;
        controller.open_handle(primary).unwrap();
        let change = SettingsChange {
            sampling_rate: Some(SamplingRate::Hz16000),
            ..SettingsChange::default()
        };
        controller.update_settings(primary, Some(change)).unwrap();

        let kept = controller.update_settings(primary, None).unwrap();
        assert_eq!(kept.sampling_rate, SamplingRate::Hz16000);
        assert_eq!(controller.session(primary).settings().sampling_rate, SamplingRate::Hz16000);
        let call = controller.menu_mut().calls.last().cloned().unwrap();
        assert_eq!(inputs(&call), vec!["1", "0"]);
    }

    #[test]
    fn test_jitter_sequence() {
        let mut controller = controller(false);
        let primary = CaptureType::Primary;
        controller.open_handle(primary).unwrap();
        controller.select_test_type(primary, TestType::ByteCounting, 0).unwrap();

        assert!(controller.check_jitter_test_result(primary).is_err());
        assert!(controller.start_jitter_test(primary, JitterTest::default()).is_err());

        controller.start_capture(primary).unwrap();
        controller.start_jitter_test(primary, JitterTest::default()).unwrap();
        let call = controller.menu_mut().calls.last().cloned().unwrap();
        assert_eq!(inputs(&call), vec!["1", "16384", "100000", "120"]);

        controller.menu_mut().replies.push_back("[ERROR] Jitter detected !".to_string());
        assert!(!controller.check_jitter_test_result(primary).unwrap());
        assert_eq!(controller.session(primary).jitter_passed(), Some(false));
    }

    #[test]
    fn test_bytes_received_without_telemetry() {
        let mut controller = controller(false);
        controller.menu_mut().replies.push_back("garbage".to_string());
        assert_eq!(controller.check_bytes_received().unwrap(), BytesReceived::default());
    }
}
