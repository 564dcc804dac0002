//! Test Suite Runner
//!
//! A case run follows the same sequence on every device:
//! 1. write the test's `postcmd` lines to the fresh console
//! 2. stage artifacts into the target workspace and streams into the target directory
//! 3. run the test's prerequisite commands
//! 4. launch the menu program and run the case through the controller
//! 5. quit the menu and remove the staged streams, whatever the outcome

pub mod assets;
pub mod cases;
pub mod clock;
pub mod report;

use std::path::PathBuf;

use crate::capture::CaptureController;
use crate::config::{join_device_path, DeviceProfile, RackConfig, TestConfig, TestSetup};
use crate::error::{Result, RmfAudioError};
use crate::menu::SuiteNavigator;
use crate::remote::{Console, RemoteFiles};

pub use assets::{sha256_hex, AssetStager, StagedAssets};
pub use cases::{CaseContext, CaseTiming, TestCase};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use report::{CaseOutcome, TestReport};

/// Everything resolved from the configuration files for a run
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub profile: DeviceProfile,
    pub setup: TestSetup,
    /// Host artifacts pushed to the target workspace for every test
    pub artifacts: Vec<PathBuf>,
    pub target_directory: String,
    pub target_workspace: String,
    /// Command that launches the menu program
    pub launch_command: String,
    pub suite: String,
    pub timing: CaseTiming,
}

impl RunPlan {
    pub fn new(rack: &RackConfig, config: &TestConfig, setup: TestSetup, profile: DeviceProfile) -> Self {
        let target_workspace = rack.target_workspace();
        Self {
            profile,
            setup,
            artifacts: config.test.artifacts.clone(),
            target_directory: rack.dut.target_directory.clone(),
            launch_command: join_device_path(&target_workspace, &config.test.execute),
            target_workspace,
            suite: config.test.suite.clone(),
            timing: CaseTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: CaseTiming) -> Self {
        self.timing = timing;
        self
    }
}

/// Run one case on a fresh console
///
/// Errors the suite can carry on from are recorded as [`CaseOutcome::Error`];
/// anything else is returned so the caller stops the run.
pub fn run_case<C: Console, F: RemoteFiles + ?Sized>(
    case: TestCase,
    plan: &RunPlan,
    console: C,
    files: &mut F,
    clock: &dyn Clock,
    report: &mut TestReport,
) -> Result<CaseOutcome> {
    report.test_start(case.name());

    let outcome = if case.requires_aux() && !plan.profile.aux_supported() {
        Ok(CaseOutcome::Skipped(
            "auxiliary capture not supported by the device profile".to_string(),
        ))
    } else {
        prepare_and_run(case, plan, console, files, clock, report)
    };

    match outcome {
        Ok(outcome) => {
            report.test_end(outcome.clone());
            Ok(outcome)
        }
        Err(e) if e.is_recoverable() => {
            log::error!("{} aborted: {}", case.name(), e);
            let outcome = CaseOutcome::Error(e.to_string());
            report.test_end(outcome.clone());
            Ok(outcome)
        }
        Err(e) => {
            log::error!("{} aborted: {}", case.name(), e);
            for suggestion in e.recovery_suggestions() {
                log::info!("  - {}", suggestion);
            }
            report.test_end(CaseOutcome::Error(e.to_string()));
            Err(e)
        }
    }
}

fn prepare_and_run<C: Console, F: RemoteFiles + ?Sized>(
    case: TestCase,
    plan: &RunPlan,
    mut console: C,
    files: &mut F,
    clock: &dyn Clock,
    report: &mut TestReport,
) -> Result<CaseOutcome> {
    let assets = plan.setup.for_test(case.name());

    for command in &assets.postcmd {
        console.send_line(command)?;
    }

    let mut stager = AssetStager::new(&mut *files);
    let staging = stager
        .artifacts(&plan.artifacts, &plan.target_workspace)
        .and_then(|()| stager.checked_artifacts(&assets.artifacts, &plan.target_directory))
        .and_then(|()| stager.streams(&assets.streams, &plan.target_directory));
    let staged = stager.finish();

    let outcome = staging.and_then(|()| {
        if case.needs_stream() && staged.streams().is_empty() {
            return Err(RmfAudioError::Config {
                path: "test setup".to_string(),
                reason: format!("{} needs at least one stream", case.name()),
            });
        }
        for command in &assets.execute {
            console.send_line(command)?;
        }

        let mut navigator = SuiteNavigator::new(console);
        navigator.start(&plan.launch_command)?;
        let mut controller = CaptureController::new(navigator, &plan.profile).with_suite(plan.suite.clone());

        let mut ctx = CaseContext {
            controller: &mut controller,
            files: &mut *files,
            clock,
            timing: &plan.timing,
            report: &mut *report,
            streams: staged.streams(),
        };
        let outcome = case.run(&mut ctx);
        if let Err(e) = controller.menu_mut().stop() {
            log::warn!("Failed to quit test menu: {}", e);
        }
        outcome
    });

    if let Err(e) = staged.cleanup(files) {
        log::warn!("Stream cleanup after {} failed: {}", case.name(), e);
    }
    outcome
}

/// Run several cases, opening a new console per case
///
/// Stops at the first error that is not recoverable.
pub fn run_cases<C, F, G>(
    cases: &[TestCase],
    plan: &RunPlan,
    clock: &dyn Clock,
    report: &mut TestReport,
    mut connect: G,
) -> Result<()>
where
    C: Console,
    F: RemoteFiles,
    G: FnMut() -> Result<(C, F)>,
{
    for &case in cases {
        let (console, mut files) = connect()?;
        run_case(case, plan, console, &mut files, clock, report)?;
    }
    log::info!(
        "Run {} finished: {} passed, {} failed, {} skipped",
        report.run_id,
        report.passed(),
        report.failed(),
        report.skipped()
    );
    Ok(())
}
