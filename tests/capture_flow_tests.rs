//! Capture Flow Tests
//!
//! The controller drives the real menu navigator over the simulated device
//! console, so every prompt and listing goes through the same text path as
//! on hardware.

use std::time::Duration;

use rmfaudio::capture::{
    parse_bytes_received, BytesReceived, CaptureController, CaptureState, CaptureType, JitterTest, SettingsChange,
    TestType,
};
use rmfaudio::config::DeviceProfile;
use rmfaudio::menu::{MenuNavigator, MockCaptureMenu, SuiteNavigator};
use rmfaudio::suite::{Clock, SimulatedClock};
use rmfaudio::RmfAudioError;

fn started_controller(
    menu: &mut MockCaptureMenu,
    aux: bool,
) -> CaptureController<SuiteNavigator<&mut MockCaptureMenu>> {
    let mut navigator = SuiteNavigator::new(menu);
    navigator.start("/tmp/rmfaudiocapture/run.sh").unwrap();
    CaptureController::new(navigator, &DeviceProfile::with_aux_support(aux))
}

fn prepare_byte_counting<N: MenuNavigator>(controller: &mut CaptureController<N>, capture_type: CaptureType) {
    controller.open_handle(capture_type).unwrap();
    controller.update_settings(capture_type, None).unwrap();
    controller.select_test_type(capture_type, TestType::ByteCounting, 0).unwrap();
}

// === Telemetry Examples ===

#[test]
fn test_bytes_received_examples() {
    assert_eq!(
        parse_bytes_received("Bytes Received for Primary capture 1024"),
        (Some(1024), None)
    );
    assert_eq!(
        parse_bytes_received("Bytes Received for Primary capture 1024\nBytes Received for Auxiliary capture 512"),
        (Some(1024), Some(512))
    );
    assert_eq!(parse_bytes_received("Capture handle opened"), (None, None));
}

// === Counter Behaviour ===

#[test]
fn test_primary_counter_freezes_after_stop() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock.clone());
    let mut controller = started_controller(&mut menu, false);

    prepare_byte_counting(&mut controller, CaptureType::Primary);
    controller.start_capture(CaptureType::Primary).unwrap();
    clock.sleep(Duration::from_secs(1));

    let running = controller.check_bytes_received().unwrap();
    assert_eq!(running.primary, Some(192_000));
    assert_eq!(running.auxiliary, None);

    controller.stop_capture(CaptureType::Primary).unwrap();
    let at_stop = controller.check_bytes_received().unwrap();
    clock.sleep(Duration::from_secs(3));
    let later = controller.check_bytes_received().unwrap();

    assert_eq!(at_stop.primary, later.primary);
    assert_eq!(controller.session(CaptureType::Primary).state(), CaptureState::Ready);
}

#[test]
fn test_stopping_primary_leaves_auxiliary_running() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock.clone());
    let mut controller = started_controller(&mut menu, true);

    prepare_byte_counting(&mut controller, CaptureType::Primary);
    prepare_byte_counting(&mut controller, CaptureType::Auxiliary);
    controller.start_capture(CaptureType::Primary).unwrap();
    controller.start_capture(CaptureType::Auxiliary).unwrap();
    clock.sleep(Duration::from_secs(2));

    controller.stop_capture(CaptureType::Primary).unwrap();
    let before = controller.check_bytes_received().unwrap();
    clock.sleep(Duration::from_secs(2));
    let after = controller.check_bytes_received().unwrap();

    assert_eq!(before.primary, after.primary);
    assert!(after.auxiliary.unwrap() > before.auxiliary.unwrap());

    controller.stop_capture(CaptureType::Auxiliary).unwrap();
    controller.close_handle(CaptureType::Primary).unwrap();
    controller.close_handle(CaptureType::Auxiliary).unwrap();
}

#[test]
fn test_updated_rate_changes_counter_speed() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock.clone());
    let mut controller = started_controller(&mut menu, false);

    controller.open_handle(CaptureType::Primary).unwrap();
    let change = SettingsChange {
        sampling_rate: Some(rmfaudio::capture::SamplingRate::Hz16000),
        ..SettingsChange::default()
    };
    let settings = controller.update_settings(CaptureType::Primary, Some(change)).unwrap();
    controller.select_test_type(CaptureType::Primary, TestType::ByteCounting, 0).unwrap();
    controller.start_capture(CaptureType::Primary).unwrap();
    clock.sleep(Duration::from_secs(1));

    let received = controller.check_bytes_received().unwrap();
    assert_eq!(received.primary, Some(settings.byte_rate()));
    assert_eq!(received.primary, Some(64_000));
}

// === Sequencing ===

#[test]
fn test_invalid_sequence_never_reaches_device() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock.clone());
    let mut controller = started_controller(&mut menu, true);

    let err = controller.start_capture(CaptureType::Auxiliary).unwrap_err();
    assert_eq!(err.to_string(), "Cannot start capture on auxiliary capture while closed");

    controller.open_handle(CaptureType::Auxiliary).unwrap();
    assert!(matches!(
        controller.start_capture(CaptureType::Auxiliary),
        Err(RmfAudioError::InvalidTransition {
            state: CaptureState::Idle,
            ..
        })
    ));
    assert_eq!(controller.check_bytes_received().unwrap(), BytesReceived {
        primary: None,
        auxiliary: None,
    });
}

#[test]
fn test_unknown_suite_is_a_menu_error() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock);
    let mut controller = started_controller(&mut menu, false).with_suite("L4 rmfAudioCapture");

    let err = controller.open_handle(CaptureType::Primary).unwrap_err();
    assert!(matches!(err, RmfAudioError::MenuEntryNotFound { .. }));
    assert_eq!(controller.session(CaptureType::Primary).state(), CaptureState::Closed);
}

// === Jitter ===

#[test]
fn test_jitter_verdicts() {
    let clock = SimulatedClock::new();
    let mut menu = MockCaptureMenu::new(clock.clone());
    {
        let mut controller = started_controller(&mut menu, false);
        prepare_byte_counting(&mut controller, CaptureType::Primary);
        controller.start_capture(CaptureType::Primary).unwrap();
        controller.start_jitter_test(CaptureType::Primary, JitterTest::default()).unwrap();
        clock.sleep(Duration::from_secs(120));
        assert!(controller.check_jitter_test_result(CaptureType::Primary).unwrap());

        // 192000 B/s delivers 19200 bytes per 100 ms, below a 32768 byte minimum
        controller.stop_capture(CaptureType::Primary).unwrap();
        controller.start_capture(CaptureType::Primary).unwrap();
        let strict = JitterTest {
            threshold: 32768,
            ..JitterTest::default()
        };
        controller.start_jitter_test(CaptureType::Primary, strict).unwrap();
        assert!(!controller.check_jitter_test_result(CaptureType::Primary).unwrap());
    }
    assert!(!menu.is_menu_running());
}

#[test]
fn test_navigator_requires_start() {
    let mut menu = MockCaptureMenu::new(SimulatedClock::new());
    let mut navigator = SuiteNavigator::new(&mut menu);
    assert!(matches!(
        navigator.select("L3 rmfAudioCapture", "Check Bytes Received", &[]),
        Err(RmfAudioError::MenuNotRunning)
    ));
}
