//! CLI Command Implementations

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::audio::{compare_buffers, load_wav, AudioBuffer, PitchExtractor};
use crate::cli::RunArgs;
use crate::config::{RackConfig, TestConfig, TestSetup};
use crate::error::{Result, RmfAudioError};
use crate::suite::{run_cases, CaseTiming, RunPlan, SystemClock, TestCase, TestReport};

/// Run the selected cases; returns false if any case failed
pub fn run(args: &RunArgs) -> Result<bool> {
    let rack = RackConfig::load(&args.rack)?;
    let config = TestConfig::load(&args.config)?;
    let setup = TestSetup::load(&args.setup)?;
    let profile = rack.load_profile()?;

    let cases = if args.test == "all" {
        TestCase::ALL.to_vec()
    } else {
        vec![args.test.parse::<TestCase>()?]
    };

    if args.poll_secs.is_nan() || args.poll_secs < 0.0 {
        return Err(RmfAudioError::InvalidValue {
            reason: format!("poll interval must be a non-negative number of seconds, got {}", args.poll_secs),
        });
    }
    let timing = CaseTiming {
        capture_secs: args.capture_secs,
        poll_interval: Duration::from_secs_f64(args.poll_secs),
        ..CaseTiming::default()
    };
    let plan = RunPlan::new(&rack, &config, setup, profile).with_timing(timing);

    info!(
        "Running {} case(s) against {} (workspace {})",
        cases.len(),
        if args.local { "localhost" } else { rack.dut.address.as_str() },
        plan.target_workspace
    );

    let clock = SystemClock::new();
    let mut report = TestReport::new();
    let result = if args.local {
        run_cases(&cases, &plan, &clock, &mut report, || {
            Ok((crate::remote::ProcessConsole::shell()?, crate::remote::LocalFiles::new("/")))
        })
    } else {
        run_remote(&rack, &cases, &plan, &clock, &mut report)
    };

    if let Some(path) = &args.report {
        report.save(path)?;
        info!("Report written to {}", path.display());
    }
    result?;

    for test in &report.tests {
        if let Some(outcome) = &test.outcome {
            println!("{:<32} {}", test.name, outcome);
        }
    }
    println!(
        "{} passed, {} failed, {} skipped",
        report.passed(),
        report.failed(),
        report.skipped()
    );
    Ok(report.failed() == 0)
}

#[cfg(feature = "ssh")]
fn run_remote(
    rack: &RackConfig,
    cases: &[TestCase],
    plan: &RunPlan,
    clock: &SystemClock,
    report: &mut TestReport,
) -> Result<()> {
    let params = rack.connection();
    run_cases(cases, plan, clock, report, || {
        crate::remote::ssh::SshLink::connect(&params)?.into_device()
    })
}

#[cfg(not(feature = "ssh"))]
fn run_remote(
    rack: &RackConfig,
    _cases: &[TestCase],
    _plan: &RunPlan,
    _clock: &SystemClock,
    _report: &mut TestReport,
) -> Result<()> {
    Err(RmfAudioError::Connection {
        host: rack.dut.address.clone(),
        port: rack.dut.port,
        reason: "built without the `ssh` feature; rebuild with --features ssh or use --local".to_string(),
    })
}

/// Compare two wav files; returns the verdict
///
/// With a rack configuration both paths are device paths fetched over SFTP,
/// otherwise they are local files.
pub fn compare(reference: &Path, captured: &Path, rack: Option<&Path>) -> Result<bool> {
    info!("Comparing {} with {}", captured.display(), reference.display());

    let (reference_audio, captured_audio) = match rack {
        Some(rack) => fetch_remote_pair(&RackConfig::load(rack)?, reference, captured)?,
        None => (load_wav(reference)?, load_wav(captured)?),
    };
    let result = compare_buffers(&reference_audio, &captured_audio);

    match result.correlation {
        Some(score) => println!("Correlation: {:.4} over {} frames", score, result.frames_compared),
        None => println!("Correlation: undefined over {} frames", result.frames_compared),
    }
    println!("{}", if result.matched { "MATCH" } else { "NO MATCH" });
    Ok(result.matched)
}

#[cfg(feature = "ssh")]
fn fetch_remote_pair(rack: &RackConfig, reference: &Path, captured: &Path) -> Result<(AudioBuffer, AudioBuffer)> {
    let pair = crate::remote::fetch_audio_pair_over_ssh(
        &rack.connection(),
        &reference.to_string_lossy(),
        &captured.to_string_lossy(),
    )?;
    Ok((pair.reference, pair.candidate))
}

#[cfg(not(feature = "ssh"))]
fn fetch_remote_pair(rack: &RackConfig, _reference: &Path, _captured: &Path) -> Result<(AudioBuffer, AudioBuffer)> {
    Err(RmfAudioError::Connection {
        host: rack.dut.address.clone(),
        port: rack.dut.port,
        reason: "built without the `ssh` feature; rebuild with --features ssh".to_string(),
    })
}

/// Print a pitch track summary
pub fn pitch(file: &Path) -> Result<()> {
    let audio = load_wav(file)?;
    let series = PitchExtractor::default().extract(&audio);

    println!("File: {}", file.display());
    println!(
        "Format: {} Hz, {} channel(s), {:.2} s",
        audio.sample_rate(),
        audio.channels(),
        audio.duration()
    );
    println!("Frames: {}", series.len());
    if series.is_empty() {
        warn!("Audio is shorter than one analysis frame");
        return Ok(());
    }
    println!(
        "Voiced: {} ({:.1}%)",
        series.voiced_count(),
        series.voiced_count() as f64 / series.len() as f64 * 100.0
    );
    match series.median_voiced() {
        Some(median) => println!("Median f0: {:.1} Hz", median),
        None => println!("Median f0: n/a (all frames unvoiced)"),
    }
    Ok(())
}

/// List the known test cases
pub fn list() {
    for case in TestCase::ALL {
        let requirement = if case.requires_aux() { " [aux]" } else { "" };
        println!("{:<32} {}{}", case.name(), case.description(), requirement);
    }
}
