//! Simulated device console
//!
//! `MockCaptureMenu` behaves like a device shell that can launch the L3
//! capture test binary. It prints the CUnit console menus, asks the same
//! prompts as the device, and simulates the capture handles against a
//! [`SimulatedClock`]: byte counters grow with simulated time while a
//! handle is capturing and freeze once it is stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{encode_wav, AudioBuffer};
use crate::capture::protocol::{entries, prompts, RETAIN_DEFAULT, SUITE_NAME};
use crate::capture::{CaptureFormat, CaptureSettings, CaptureType, SamplingRate, TestType};
use crate::error::{Result, RmfAudioError};
use crate::menu::grammar::MenuGrammar;
use crate::remote::console::Console;
use crate::suite::clock::{Clock, SimulatedClock};

const MAIN_MENU: &str = "\n***************** CUNIT CONSOLE - MAIN MENU ******************************\n\
(R)un  (S)elect  (L)ist  (A)ctivate  (F)ailures  (O)ptions  (H)elp  (Q)uit\n";

const SUITE_MENU_HEADER: &str = "\n***************** CUNIT CONSOLE - SUITE MENU ***************************\n";

const SUITE_MENU_KEYS: &str = "(R)un (S)elect (L)ist (A)ctivate (F)ailures (O)ptions (U)p (Q)uit\n";

const OTHER_SUITE: &str = "L1 rmfAudioCapture";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Shell,
    Main,
    Suite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Awaiting {
    Command,
    SuiteNumber,
    TestNumber,
    Answers { entry: &'static str, answers: Vec<String> },
}

#[derive(Debug, Clone, Copy)]
struct SimJitter {
    threshold: u32,
    interval_us: u64,
}

#[derive(Debug, Clone, Default)]
struct SimHandle {
    open: bool,
    settings: CaptureSettings,
    test_type: Option<TestType>,
    capture_limit: Option<Duration>,
    captured: Duration,
    capturing_since: Option<Duration>,
    jitter: Option<SimJitter>,
}

impl SimHandle {
    fn captured_at(&self, now: Duration) -> Duration {
        match self.capturing_since {
            Some(since) => self.captured + now.saturating_sub(since),
            None => self.captured,
        }
    }

    fn bytes_at(&self, now: Duration) -> u64 {
        (self.settings.byte_rate() as f64 * self.captured_at(now).as_secs_f64()) as u64
    }
}

/// Simulated device shell running the L3 capture test binary
pub struct MockCaptureMenu {
    clock: SimulatedClock,
    grammar: MenuGrammar,
    launch_marker: String,
    aux_supported: bool,
    jitter_glitch: bool,
    files_root: Option<PathBuf>,
    source: Option<AudioBuffer>,
    level: Level,
    awaiting: Awaiting,
    output: String,
    shell_history: Vec<String>,
    primary: SimHandle,
    auxiliary: SimHandle,
}

impl MockCaptureMenu {
    pub fn new(clock: SimulatedClock) -> Self {
        Self {
            clock,
            grammar: MenuGrammar::default(),
            launch_marker: "run.sh".to_string(),
            aux_supported: true,
            jitter_glitch: false,
            files_root: None,
            source: None,
            level: Level::Shell,
            awaiting: Awaiting::Command,
            output: String::new(),
            shell_history: Vec::new(),
            primary: SimHandle::default(),
            auxiliary: SimHandle::default(),
        }
    }

    /// Shell lines containing `marker` launch the test binary
    pub fn with_launch_marker(mut self, marker: impl Into<String>) -> Self {
        self.launch_marker = marker.into();
        self
    }

    pub fn with_aux_support(mut self, supported: bool) -> Self {
        self.aux_supported = supported;
        self
    }

    /// Report jitter regardless of the monitor parameters
    pub fn with_jitter_glitch(mut self, glitch: bool) -> Self {
        self.jitter_glitch = glitch;
        self
    }

    /// Local directory standing in for the device filesystem root
    pub fn with_files_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.files_root = Some(root.into());
        self
    }

    /// Audio "played" into the capture inputs
    pub fn with_source(mut self, source: AudioBuffer) -> Self {
        self.source = Some(source);
        self
    }

    /// Lines sent while no test binary was running
    pub fn shell_history(&self) -> &[String] {
        &self.shell_history
    }

    pub fn is_menu_running(&self) -> bool {
        self.level != Level::Shell
    }

    /// Current simulated counter of a handle
    pub fn bytes_captured(&self, capture_type: CaptureType) -> u64 {
        self.handle(capture_type).bytes_at(self.clock.now())
    }

    fn handle(&self, capture_type: CaptureType) -> &SimHandle {
        match capture_type {
            CaptureType::Primary => &self.primary,
            CaptureType::Auxiliary => &self.auxiliary,
        }
    }

    fn handle_mut(&mut self, capture_type: CaptureType) -> &mut SimHandle {
        match capture_type {
            CaptureType::Primary => &mut self.primary,
            CaptureType::Auxiliary => &mut self.auxiliary,
        }
    }

    // ========================================================================
    // Menu rendering
    // ========================================================================

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn print_main_menu(&mut self) {
        self.level = Level::Main;
        self.awaiting = Awaiting::Command;
        let prompt = self.grammar.command_prompt.clone();
        self.print(MAIN_MENU);
        self.print(&prompt);
    }

    fn print_suite_menu(&mut self) {
        self.level = Level::Suite;
        self.awaiting = Awaiting::Command;
        let prompt = self.grammar.command_prompt.clone();
        self.print(SUITE_MENU_HEADER);
        self.print(&format!("Suite: {}\n", SUITE_NAME));
        self.print(SUITE_MENU_KEYS);
        self.print(&prompt);
    }

    fn print_suite_listing(&mut self) {
        let listing = format!(
            "\n--------------------- Registered Suites -----------------------------\n\
             \x20    #  Suite Name                         Init?  Cleanup?  #Tests  Active?\n\n\
             \x20    1. {:<34} No       No        2      Yes\n\
             \x20    2. {:<34} No       No        {:<6} Yes\n\n{} (1-2) : ",
            OTHER_SUITE,
            SUITE_NAME,
            entries::ALL.len(),
            self.grammar.suite_prompt
        );
        self.print(&listing);
        self.awaiting = Awaiting::SuiteNumber;
    }

    fn print_test_listing(&mut self) {
        let mut listing = format!(
            "\n--------------- Test List ---------------------------------\n\
             Suite: {}\n\n\x20    #  Test Name                          Active?\n\n",
            SUITE_NAME
        );
        for (index, entry) in entries::ALL.iter().enumerate() {
            listing.push_str(&format!("  {:>4}. {:<34} Yes\n", index + 1, entry));
        }
        listing.push_str(&format!("\n{} (1-{}) : ", self.grammar.test_prompt, entries::ALL.len()));
        self.print(&listing);
        self.awaiting = Awaiting::TestNumber;
    }

    // ========================================================================
    // Input dispatch
    // ========================================================================

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        match self.awaiting.clone() {
            Awaiting::Command => self.handle_command(line),
            Awaiting::SuiteNumber => match line {
                "2" => self.print_suite_menu(),
                _ => self.print_main_menu(),
            },
            Awaiting::TestNumber => {
                let entry = line
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| entries::ALL.get(i).copied());
                match entry {
                    Some(entry) => self.advance_test(entry, Vec::new()),
                    None => self.print_suite_menu(),
                }
            }
            Awaiting::Answers { entry, mut answers } => {
                answers.push(line.to_string());
                self.advance_test(entry, answers);
            }
        }
    }

    fn handle_command(&mut self, line: &str) {
        match self.level {
            Level::Shell => {
                self.shell_history.push(line.to_string());
                if line.contains(&self.launch_marker) {
                    self.print_main_menu();
                }
            }
            Level::Main => match line.to_ascii_lowercase().as_str() {
                "s" => self.print_suite_listing(),
                "q" => {
                    self.print("\nExiting...\n");
                    self.level = Level::Shell;
                }
                _ => self.print_main_menu(),
            },
            Level::Suite => match line.to_ascii_lowercase().as_str() {
                "s" => self.print_test_listing(),
                "u" => self.print_main_menu(),
                "q" => {
                    self.print("\nExiting...\n");
                    self.level = Level::Shell;
                }
                _ => self.print_suite_menu(),
            },
        }
    }

    fn advance_test(&mut self, entry: &'static str, answers: Vec<String>) {
        let sequence = prompt_sequence(entry, &answers);
        if let Some(prompt) = sequence.get(answers.len()) {
            if *prompt == prompts::CAPTURE_TYPE {
                self.print("\n\t1. Primary Audio Capture\n\t2. Auxiliary Audio Capture\n");
            }
            self.print(&format!("{}\n", prompt));
            self.awaiting = Awaiting::Answers { entry, answers };
            return;
        }

        self.print(&format!("\n[INFO] Running test: {}\n", entry));
        let result = self.execute(entry, &answers);
        match result {
            Ok(text) => self.print(&text),
            Err(text) => self.print(&format!("[ERROR] {}\n", text)),
        }
        self.print_suite_menu();
    }

    // ========================================================================
    // Simulated capture
    // ========================================================================

    fn execute(&mut self, entry: &str, answers: &[String]) -> std::result::Result<String, String> {
        let now = self.clock.now();

        if entry == entries::CHECK_BYTES_RECEIVED {
            let mut text = String::new();
            for capture_type in CaptureType::ALL {
                let handle = self.handle(capture_type);
                if handle.open {
                    text.push_str(&format!(
                        "Bytes Received for {} capture {}\n",
                        capture_type.label(),
                        handle.bytes_at(now)
                    ));
                }
            }
            return Ok(text);
        }

        let capture_type = answers
            .first()
            .and_then(|value| value.parse::<u8>().ok())
            .and_then(CaptureType::from_menu_value)
            .ok_or_else(|| "Invalid capture type".to_string())?;

        if entry == entries::OPEN_HANDLE {
            if capture_type == CaptureType::Auxiliary && !self.aux_supported {
                return Err("RMF_AudioCapture_Open_Type failed: auxiliary capture not supported".to_string());
            }
            let handle = self.handle_mut(capture_type);
            if handle.open {
                return Err("Handle already open".to_string());
            }
            *handle = SimHandle {
                open: true,
                ..SimHandle::default()
            };
            return Ok(format!("{} capture handle opened\n", capture_type.label()));
        }

        let handle = self.handle(capture_type).clone();
        if !handle.open {
            return Err(format!("{} capture handle is not open", capture_type.label()));
        }

        match entry {
            entries::CLOSE_HANDLE => {
                if handle.capturing_since.is_some() {
                    return Err("Capture still running".to_string());
                }
                *self.handle_mut(capture_type) = SimHandle::default();
                Ok(format!("{} capture handle closed\n", capture_type.label()))
            }
            entries::UPDATE_SETTINGS => {
                let settings = apply_settings_answers(&handle.settings, answers)?;
                let warning = if settings.threshold_within_guidance() {
                    String::new()
                } else {
                    "[WARNING] Threshold exceeds 1/4th of FIFO size\n".to_string()
                };
                self.handle_mut(capture_type).settings = settings;
                Ok(format!(
                    "{}Settings: format {:?}, rate {} Hz, fifo {} bytes, threshold {} bytes\n",
                    warning,
                    settings.format,
                    settings.sampling_rate.hz(),
                    settings.fifo_size,
                    settings.threshold
                ))
            }
            entries::SELECT_TEST_TYPE => {
                let test_type = answers
                    .get(1)
                    .and_then(|value| value.parse::<u8>().ok())
                    .and_then(TestType::from_menu_value)
                    .ok_or_else(|| "Invalid test type".to_string())?;
                let limit = match test_type {
                    TestType::DataCapture => {
                        let secs = answers
                            .get(2)
                            .and_then(|value| value.parse::<u64>().ok())
                            .ok_or_else(|| "Invalid data capture duration".to_string())?;
                        Some(Duration::from_secs(secs))
                    }
                    TestType::ByteCounting => None,
                };
                let handle = self.handle_mut(capture_type);
                handle.test_type = Some(test_type);
                handle.capture_limit = limit;
                Ok(format!("Test type {:?} selected\n", test_type))
            }
            entries::START_CAPTURE => {
                if handle.capturing_since.is_some() {
                    return Err("Capture already started".to_string());
                }
                let handle = self.handle_mut(capture_type);
                handle.captured = Duration::ZERO;
                handle.jitter = None;
                handle.capturing_since = Some(now);
                Ok(format!("{} capture started\n", capture_type.label()))
            }
            entries::STOP_CAPTURE => {
                if handle.capturing_since.is_none() {
                    return Err("Capture not started".to_string());
                }
                let handle = self.handle_mut(capture_type);
                handle.captured = handle.captured_at(now);
                handle.capturing_since = None;
                Ok(format!("{} capture stopped\n", capture_type.label()))
            }
            entries::WRITE_WAV => {
                let path = answers.get(1).cloned().unwrap_or_default();
                self.write_capture(&handle, &path, now)?;
                Ok(format!("Output written to {}\n", path))
            }
            entries::START_JITTER_TEST => {
                if handle.capturing_since.is_none() {
                    return Err("Capture not started".to_string());
                }
                let threshold = parse_answer::<u32>(answers, 1, "jitter threshold")?;
                let interval_us = parse_answer::<u64>(answers, 2, "jitter interval")?;
                parse_answer::<u64>(answers, 3, "jitter duration")?;
                self.handle_mut(capture_type).jitter = Some(SimJitter {
                    threshold,
                    interval_us,
                });
                Ok("Created thread to monitor buffer for jitter\n".to_string())
            }
            entries::CHECK_JITTER_RESULT => {
                let jitter = handle.jitter.ok_or_else(|| "Jitter test not started".to_string())?;
                let per_interval =
                    handle.settings.byte_rate() as f64 * jitter.interval_us as f64 / 1_000_000.0;
                if self.jitter_glitch || per_interval < jitter.threshold as f64 {
                    Ok("[ERROR] Jitter detected !\n".to_string())
                } else {
                    Ok("No jitter detected\n".to_string())
                }
            }
            other => Err(format!("Unknown test '{}'", other)),
        }
    }

    fn write_capture(&self, handle: &SimHandle, path: &str, now: Duration) -> std::result::Result<(), String> {
        if handle.test_type != Some(TestType::DataCapture) {
            return Err("Data capture test not selected".to_string());
        }
        let root = self
            .files_root
            .as_ref()
            .ok_or_else(|| format!("Failed to open {}", path))?;

        let mut stored = handle.captured_at(now);
        if let Some(limit) = handle.capture_limit {
            stored = stored.min(limit);
        }
        let buffer = captured_audio(self.source.as_ref(), &handle.settings, stored)
            .map_err(|e| e.to_string())?;
        let bytes = encode_wav(&buffer, handle.settings.format.bits_per_sample())
            .map_err(|e| e.to_string())?;

        let local = local_path(root, path);
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&local, bytes).map_err(|e| e.to_string())
    }
}

impl Console for MockCaptureMenu {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.handle_line(line);
        Ok(())
    }

    fn read_until(&mut self, marker: &str) -> Result<String> {
        match self.output.find(marker) {
            Some(position) => Ok(self.output.drain(..position + marker.len()).collect()),
            None => Err(RmfAudioError::ConsoleClosed {
                expected: marker.to_string(),
            }),
        }
    }
}

/// Prompts asked by an entry, given the answers so far
fn prompt_sequence(entry: &str, answers: &[String]) -> Vec<&'static str> {
    let answered = |index: usize, value: &str| answers.get(index).map(|a| a == value).unwrap_or(false);
    match entry {
        entries::CHECK_BYTES_RECEIVED => vec![],
        entries::UPDATE_SETTINGS => {
            let mut sequence = vec![prompts::CAPTURE_TYPE, prompts::UPDATE_DEFAULTS];
            if answered(1, "1") {
                sequence.extend([
                    prompts::FORMAT,
                    prompts::SAMPLING_RATE,
                    prompts::FIFO_SIZE,
                    prompts::THRESHOLD,
                ]);
            }
            sequence
        }
        entries::SELECT_TEST_TYPE => {
            let mut sequence = vec![prompts::CAPTURE_TYPE, prompts::TEST_TYPE];
            if answered(1, "2") {
                sequence.push(prompts::CAPTURE_DURATION);
            }
            sequence
        }
        entries::WRITE_WAV => vec![prompts::CAPTURE_TYPE, prompts::OUTPUT_FILE],
        entries::START_JITTER_TEST => vec![
            prompts::CAPTURE_TYPE,
            prompts::JITTER_THRESHOLD,
            prompts::JITTER_INTERVAL,
            prompts::JITTER_DURATION,
        ],
        _ => vec![prompts::CAPTURE_TYPE],
    }
}

fn parse_answer<T: std::str::FromStr>(answers: &[String], index: usize, what: &str) -> std::result::Result<T, String> {
    answers
        .get(index)
        .and_then(|value| value.parse::<T>().ok())
        .ok_or_else(|| format!("Invalid {}", what))
}

fn apply_settings_answers(current: &CaptureSettings, answers: &[String]) -> std::result::Result<CaptureSettings, String> {
    if answers.get(1).map(String::as_str) != Some("1") {
        return Ok(*current);
    }
    let value = |index: usize| answers.get(index).map(String::as_str).filter(|v| *v != RETAIN_DEFAULT);

    let mut settings = *current;
    if let Some(format) = value(2) {
        settings.format = format
            .parse::<u8>()
            .ok()
            .and_then(CaptureFormat::from_menu_value)
            .ok_or_else(|| "Invalid capture format".to_string())?;
    }
    if let Some(rate) = value(3) {
        settings.sampling_rate = rate
            .parse::<u8>()
            .ok()
            .and_then(SamplingRate::from_menu_value)
            .ok_or_else(|| "Invalid sampling rate".to_string())?;
    }
    if let Some(fifo) = value(4) {
        settings.fifo_size = fifo.parse().map_err(|_| "Invalid FIFO size".to_string())?;
    }
    if let Some(threshold) = value(5) {
        settings.threshold = threshold.parse().map_err(|_| "Invalid threshold".to_string())?;
    }
    Ok(settings)
}

/// Audio a handle would hold after capturing `stored` of the source
fn captured_audio(source: Option<&AudioBuffer>, settings: &CaptureSettings, stored: Duration) -> Result<AudioBuffer> {
    let channels = settings.format.channels();
    match source {
        Some(source) => {
            let frames = ((stored.as_secs_f64() * source.sample_rate() as f64) as usize).min(source.num_frames());
            let mono = source.to_mono();
            let samples = mono[..frames]
                .iter()
                .flat_map(|&sample| std::iter::repeat(sample).take(channels as usize))
                .collect();
            AudioBuffer::new(samples, channels, source.sample_rate())
        }
        None => Ok(AudioBuffer::silence(
            stored.as_secs_f32(),
            channels,
            settings.sampling_rate.hz(),
        )),
    }
}

/// Map an absolute device path under a local root
pub(crate) fn local_path(root: &Path, device_path: &str) -> PathBuf {
    root.join(device_path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::generate_chirp;

    fn answer(menu: &mut MockCaptureMenu, prompt: &str, value: &str) {
        menu.read_until(prompt).unwrap();
        menu.send_line(value).unwrap();
    }

    fn run(menu: &mut MockCaptureMenu, test_number: &str, answers: &[(&str, &str)]) -> String {
        menu.send_line("s").unwrap();
        menu.read_until("Enter number of suite to select").unwrap();
        menu.send_line("2").unwrap();
        menu.read_until("Enter command: ").unwrap();
        menu.send_line("s").unwrap();
        menu.read_until("Enter number of test to select").unwrap();
        menu.send_line(test_number).unwrap();
        for (prompt, value) in answers {
            answer(menu, prompt, value);
        }
        let output = menu.read_until("Enter command: ").unwrap();
        menu.send_line("u").unwrap();
        menu.read_until("Enter command: ").unwrap();
        output
    }

    #[test]
    fn test_shell_lines_are_recorded_until_launch() {
        let mut menu = MockCaptureMenu::new(SimulatedClock::new());
        menu.send_line("cd /tmp/rmfaudiocapture").unwrap();
        assert!(menu.read_until("Enter command: ").is_err());

        menu.send_line("/tmp/rmfaudiocapture/run.sh -p profile.yaml").unwrap();
        assert!(menu.read_until("Enter command: ").is_ok());
        assert!(menu.is_menu_running());
        assert_eq!(menu.shell_history().len(), 2);

        menu.send_line("q").unwrap();
        assert!(!menu.is_menu_running());
    }

    #[test]
    fn test_counter_follows_clock() {
        let clock = SimulatedClock::new();
        let mut menu = MockCaptureMenu::new(clock.clone());
        menu.send_line("./run.sh").unwrap();
        menu.read_until("Enter command: ").unwrap();

        let capture_type = prompts::CAPTURE_TYPE;
        run(&mut menu, "1", &[(capture_type, "1")]);
        run(&mut menu, "4", &[(capture_type, "1"), (prompts::TEST_TYPE, "1")]);
        run(&mut menu, "5", &[(capture_type, "1")]);

        clock.advance(Duration::from_secs(2));
        let output = run(&mut menu, "7", &[]);
        assert!(output.contains("Bytes Received for Primary capture 384000"));

        run(&mut menu, "6", &[(capture_type, "1")]);
        clock.advance(Duration::from_secs(5));
        assert_eq!(menu.bytes_captured(CaptureType::Primary), 384_000);
    }

    #[test]
    fn test_aux_open_fails_without_support() {
        let mut menu = MockCaptureMenu::new(SimulatedClock::new()).with_aux_support(false);
        menu.send_line("./run.sh").unwrap();
        menu.read_until("Enter command: ").unwrap();
        let output = run(&mut menu, "1", &[(prompts::CAPTURE_TYPE, "2")]);
        assert!(output.contains("[ERROR]"));
    }

    #[test]
    fn test_captured_audio_replicates_channels() {
        let source = generate_chirp(200.0, 400.0, 1.0, 8000);
        let settings = CaptureSettings::default();
        let buffer = captured_audio(Some(&source), &settings, Duration::from_millis(500)).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.num_frames(), 4000);
        assert_eq!(buffer.sample_rate(), 8000);
    }

    #[test]
    fn test_settings_answers() {
        let answers: Vec<String> = ["1", "1", "-1", "1", "16384", "-1"].iter().map(|s| s.to_string()).collect();
        let settings = apply_settings_answers(&CaptureSettings::default(), &answers).unwrap();
        assert_eq!(settings.sampling_rate, SamplingRate::Hz22050);
        assert_eq!(settings.fifo_size, 16384);
        assert_eq!(settings.threshold, 8192);
        assert_eq!(settings.format, CaptureFormat::Stereo16Bit);

        let declined: Vec<String> = ["1", "0"].iter().map(|s| s.to_string()).collect();
        assert_eq!(apply_settings_answers(&settings, &declined).unwrap(), settings);
    }
}
