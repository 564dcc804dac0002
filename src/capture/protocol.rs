//! Text of the on-device L3 capture menu
//!
//! Entry names and prompts are matched literally against the device
//! output, so they are kept verbatim here and shared with the simulator.

/// Suite registered by the device test binary
pub const SUITE_NAME: &str = "L3 rmfAudioCapture";

/// Test entries of the capture suite, in registration order
pub mod entries {
    pub const OPEN_HANDLE: &str = "Open RMF Audio Capture Handle";
    pub const CLOSE_HANDLE: &str = "Close RMF Audio Capture Handle";
    pub const UPDATE_SETTINGS: &str = "Update settings";
    pub const SELECT_TEST_TYPE: &str = "Select the type of test";
    pub const START_CAPTURE: &str = "Start RMF Audio Capture";
    pub const STOP_CAPTURE: &str = "Stop RMF Audio Capture";
    pub const CHECK_BYTES_RECEIVED: &str = "Check Bytes Received";
    pub const WRITE_WAV: &str = "Write output wav file";
    pub const START_JITTER_TEST: &str = "Start Jitter test";
    pub const CHECK_JITTER_RESULT: &str = "Check jitter test result";

    pub const ALL: [&str; 10] = [
        OPEN_HANDLE,
        CLOSE_HANDLE,
        UPDATE_SETTINGS,
        SELECT_TEST_TYPE,
        START_CAPTURE,
        STOP_CAPTURE,
        CHECK_BYTES_RECEIVED,
        WRITE_WAV,
        START_JITTER_TEST,
        CHECK_JITTER_RESULT,
    ];
}

/// Prompts printed by the test entries
pub mod prompts {
    pub const CAPTURE_TYPE: &str = "Select the audio capture type :";
    pub const UPDATE_DEFAULTS: &str = "Do you want to update default settings ? (0 for No, 1 for Yes)";
    pub const FORMAT: &str = "Select the capture format to update, use -1 to retain default value :";
    pub const SAMPLING_RATE: &str = "Select the Sampling Rate, use -1 to retain default value :";
    pub const FIFO_SIZE: &str = "Enter FIFO size in bytes, use -1 to retain default value :";
    pub const THRESHOLD: &str = "Enter data callback threshold in bytes, used to check jitter (max 1/4th of FIFO), use -1 to retain default value :";
    pub const TEST_TYPE: &str = "Select the type of test: ";
    pub const CAPTURE_DURATION: &str = "Enter test duration in seconds for data capture test :";
    pub const OUTPUT_FILE: &str = "Enter file name and location to create output filename (example - /tmp/output.wav) :";
    pub const JITTER_THRESHOLD: &str = "Enter minimum threshold in bytes to check jitter : ";
    pub const JITTER_INTERVAL: &str = "Enter interval in microseconds to monitor buffer for jitter : ";
    pub const JITTER_DURATION: &str = "Enter test duration in seconds for jitter test : ";
}

/// Value typed at a "use -1 to retain default value" prompt to keep the current setting
pub const RETAIN_DEFAULT: &str = "-1";
