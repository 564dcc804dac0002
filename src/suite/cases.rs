//! L3 capture test cases
//!
//! Each case drives the controller through one scenario and turns the
//! observations into step verdicts. Waits go through the [`Clock`] so the
//! same cases run against hardware and the simulated device.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::capture::{CaptureController, CaptureState, CaptureType, JitterTest, TestType};
use crate::error::{Result, RmfAudioError};
use crate::menu::MenuNavigator;
use crate::remote::{compare_remote_audio, RemoteFiles};
use crate::suite::clock::Clock;
use crate::suite::report::{CaseOutcome, TestReport};

pub const PRIMARY_OUTPUT_WAV: &str = "/tmp/output_primary.wav";
pub const AUXILIARY_OUTPUT_WAV: &str = "/tmp/output_auxiliary.wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCase {
    PrimaryDataCapture,
    PrimaryJitterTest,
    IndependentDataCheck,
    AuxiliaryDataCapture,
    AuxiliaryJitterTest,
}

impl TestCase {
    pub const ALL: [TestCase; 5] = [
        TestCase::PrimaryDataCapture,
        TestCase::PrimaryJitterTest,
        TestCase::IndependentDataCheck,
        TestCase::AuxiliaryDataCapture,
        TestCase::AuxiliaryJitterTest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestCase::PrimaryDataCapture => "test01_primaryDataCapture",
            TestCase::PrimaryJitterTest => "test02_primaryJitterTest",
            TestCase::IndependentDataCheck => "test03_independentDataCheck",
            TestCase::AuxiliaryDataCapture => "test04_auxiliaryDataCapture",
            TestCase::AuxiliaryJitterTest => "test06_auxiliaryJitterTest",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TestCase::PrimaryDataCapture => "Capture primary audio to a wav file and compare it with the played stream",
            TestCase::PrimaryJitterTest => "Monitor primary capture buffers for jitter",
            TestCase::IndependentDataCheck => "Check primary and auxiliary captures run independently",
            TestCase::AuxiliaryDataCapture => "Capture auxiliary audio to a wav file and compare it with the played stream",
            TestCase::AuxiliaryJitterTest => "Monitor auxiliary capture buffers for jitter",
        }
    }

    pub fn requires_aux(self) -> bool {
        matches!(
            self,
            TestCase::IndependentDataCheck | TestCase::AuxiliaryDataCapture | TestCase::AuxiliaryJitterTest
        )
    }

    /// Whether the case compares against a reference stream
    pub fn needs_stream(self) -> bool {
        matches!(self, TestCase::PrimaryDataCapture | TestCase::AuxiliaryDataCapture)
    }

    /// Run the case; a missing auxiliary capability yields `Skipped`
    pub fn run<N: MenuNavigator, F: RemoteFiles + ?Sized>(self, ctx: &mut CaseContext<'_, N, F>) -> Result<CaseOutcome> {
        if self.requires_aux() && !ctx.controller.check_auxiliary_support() {
            let reason = "auxiliary capture not supported by the device profile".to_string();
            log::info!("{}: {}", self.name(), reason);
            return Ok(CaseOutcome::Skipped(reason));
        }

        let result = match self {
            TestCase::PrimaryDataCapture => data_capture(ctx, CaptureType::Primary, PRIMARY_OUTPUT_WAV),
            TestCase::AuxiliaryDataCapture => data_capture(ctx, CaptureType::Auxiliary, AUXILIARY_OUTPUT_WAV),
            TestCase::PrimaryJitterTest => jitter_check(ctx, CaptureType::Primary),
            TestCase::AuxiliaryJitterTest => jitter_check(ctx, CaptureType::Auxiliary),
            TestCase::IndependentDataCheck => independent_data_check(ctx),
        };

        match result {
            Ok(true) => Ok(CaseOutcome::Passed),
            Ok(false) => Ok(CaseOutcome::Failed),
            Err(e) => {
                teardown(&mut *ctx.controller);
                Err(e)
            }
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestCase {
    type Err = RmfAudioError;

    fn from_str(s: &str) -> Result<Self> {
        TestCase::ALL
            .into_iter()
            .find(|case| case.name() == s)
            .ok_or_else(|| RmfAudioError::UnknownTestCase { name: s.to_string() })
    }
}

/// Waits used by the cases
#[derive(Debug, Clone, PartialEq)]
pub struct CaseTiming {
    /// Length of a data capture run
    pub capture_secs: u32,
    /// Wait between counter readings in the independence check
    pub poll_interval: Duration,
    /// Delay between starting capture and starting the jitter monitor
    pub jitter_settle: Duration,
    pub jitter: JitterTest,
}

impl Default for CaseTiming {
    fn default() -> Self {
        Self {
            capture_secs: 10,
            poll_interval: Duration::from_secs(2),
            jitter_settle: Duration::from_millis(100),
            jitter: JitterTest::default(),
        }
    }
}

/// Everything a case needs from the run
pub struct CaseContext<'a, N: MenuNavigator, F: RemoteFiles + ?Sized> {
    pub controller: &'a mut CaptureController<N>,
    pub files: &'a mut F,
    pub clock: &'a dyn Clock,
    pub timing: &'a CaseTiming,
    pub report: &'a mut TestReport,
    /// Device paths of the staged reference streams
    pub streams: &'a [String],
}

fn data_capture<N: MenuNavigator, F: RemoteFiles + ?Sized>(
    ctx: &mut CaseContext<'_, N, F>,
    capture_type: CaptureType,
    output: &str,
) -> Result<bool> {
    let step = format!("{} audio capture", capture_type.label());
    ctx.report.step_start(&step);

    let reference = ctx.streams.first().cloned().ok_or_else(|| RmfAudioError::Config {
        path: "test setup".to_string(),
        reason: "no reference stream configured".to_string(),
    })?;

    let capture_secs = ctx.timing.capture_secs;
    let controller = &mut *ctx.controller;
    controller.open_handle(capture_type)?;
    controller.update_settings(capture_type, None)?;
    controller.select_test_type(capture_type, TestType::DataCapture, capture_secs)?;
    controller.start_capture(capture_type)?;

    ctx.clock.sleep(Duration::from_secs(capture_secs as u64));

    let received = controller.check_bytes_received()?;
    if let Some(bytes) = received.get(capture_type) {
        let settings = controller.session(capture_type).settings();
        let expected = settings.expected_bytes(capture_secs as f64);
        log::info!(
            "{} capture delivered {} of {} expected bytes{}",
            capture_type,
            bytes,
            expected,
            if settings.delivery_within_tolerance(bytes, capture_secs as f64) {
                ""
            } else {
                " (outside 90-110%)"
            }
        );
    }

    controller.stop_capture(capture_type)?;
    controller.write_wav_file(capture_type, output)?;
    controller.close_handle(capture_type)?;

    let comparison = compare_remote_audio(&mut *ctx.files, &reference, output)?;
    Ok(ctx.report.step_result(comparison.matched, &step))
}

fn jitter_check<N: MenuNavigator, F: RemoteFiles + ?Sized>(
    ctx: &mut CaseContext<'_, N, F>,
    capture_type: CaptureType,
) -> Result<bool> {
    let step = format!("{} jitter test", capture_type.label());
    ctx.report.step_start(&step);

    let jitter = ctx.timing.jitter;
    let controller = &mut *ctx.controller;
    controller.open_handle(capture_type)?;
    controller.update_settings(capture_type, None)?;
    controller.select_test_type(capture_type, TestType::ByteCounting, 0)?;
    controller.start_capture(capture_type)?;

    ctx.clock.sleep(ctx.timing.jitter_settle);
    controller.start_jitter_test(capture_type, jitter)?;
    ctx.clock.sleep(Duration::from_secs(jitter.duration_secs));

    let passed = controller.check_jitter_test_result(capture_type)?;
    controller.stop_capture(capture_type)?;
    controller.close_handle(capture_type)?;

    Ok(ctx.report.step_result(passed, &step))
}

/// Stop `stopped` while `running` keeps capturing; `running` must grow and `stopped` must hold
fn check_independence<N: MenuNavigator, F: RemoteFiles + ?Sized>(
    ctx: &mut CaseContext<'_, N, F>,
    running: CaptureType,
    stopped: CaptureType,
) -> Result<bool> {
    let step = format!("Independent data test - check {} runs independently", running);
    ctx.report.step_start(&step);

    ctx.controller.start_capture(CaptureType::Primary)?;
    ctx.controller.start_capture(CaptureType::Auxiliary)?;
    ctx.clock.sleep(ctx.timing.poll_interval);

    ctx.controller.stop_capture(stopped)?;
    let before = ctx.controller.check_bytes_received()?;
    ctx.clock.sleep(ctx.timing.poll_interval);
    let after = ctx.controller.check_bytes_received()?;

    let grew = matches!(
        (before.get(running), after.get(running)),
        (Some(b), Some(a)) if b < a
    );
    let held = matches!(
        (before.get(stopped), after.get(stopped)),
        (Some(b), Some(a)) if b == a
    );
    log::info!(
        "{}: {:?} -> {:?}, {}: {:?} -> {:?}",
        running,
        before.get(running),
        after.get(running),
        stopped,
        before.get(stopped),
        after.get(stopped)
    );

    let passed = ctx.report.step_result(grew && held, &step);
    ctx.controller.stop_capture(running)?;
    Ok(passed)
}

fn independent_data_check<N: MenuNavigator, F: RemoteFiles + ?Sized>(ctx: &mut CaseContext<'_, N, F>) -> Result<bool> {
    for capture_type in CaptureType::ALL {
        ctx.controller.open_handle(capture_type)?;
        ctx.controller.update_settings(capture_type, None)?;
        ctx.controller.select_test_type(capture_type, TestType::ByteCounting, 0)?;
    }

    let auxiliary_independent = check_independence(ctx, CaptureType::Auxiliary, CaptureType::Primary)?;
    let primary_independent = check_independence(ctx, CaptureType::Primary, CaptureType::Auxiliary)?;

    for capture_type in CaptureType::ALL {
        ctx.controller.close_handle(capture_type)?;
    }
    Ok(auxiliary_independent && primary_independent)
}

/// Best-effort stop and close after a failed case
fn teardown<N: MenuNavigator>(controller: &mut CaptureController<N>) {
    for capture_type in CaptureType::ALL {
        if controller.session(capture_type).state() == CaptureState::Capturing {
            if let Err(e) = controller.stop_capture(capture_type) {
                log::warn!("Failed to stop {} capture during teardown: {}", capture_type, e);
            }
        }
        if controller.session(capture_type).is_open() {
            if let Err(e) = controller.close_handle(capture_type) {
                log::warn!("Failed to close {} handle during teardown: {}", capture_type, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for case in TestCase::ALL {
            assert_eq!(case.name().parse::<TestCase>().unwrap(), case);
        }
        assert!(matches!(
            "test05_missing".parse::<TestCase>(),
            Err(RmfAudioError::UnknownTestCase { .. })
        ));
    }

    #[test]
    fn test_aux_requirements() {
        assert!(!TestCase::PrimaryDataCapture.requires_aux());
        assert!(!TestCase::PrimaryJitterTest.requires_aux());
        assert!(TestCase::IndependentDataCheck.requires_aux());
        assert!(TestCase::AuxiliaryJitterTest.requires_aux());
        assert!(TestCase::AuxiliaryDataCapture.needs_stream());
        assert!(!TestCase::IndependentDataCheck.needs_stream());
    }
}
