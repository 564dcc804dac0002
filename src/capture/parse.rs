//! Telemetry parsing for menu responses
//!
//! Response text is free-form console output. Parsing is tolerant: missing
//! or malformed telemetry yields `None`/`false`, never an error.

use std::sync::OnceLock;

use regex::Regex;

fn bytes_received_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Bytes Received for (\w+) capture (\d+)").expect("valid bytes-received pattern")
    })
}

fn jitter_detected_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)jitter detected !").expect("valid jitter pattern"))
}

/// Extract `(primary, auxiliary)` byte counters from a "Check Bytes Received" response
///
/// Counters are keyed by the label in each line. When no primary counter
/// is present the auxiliary one is not reported either.
pub fn parse_bytes_received(text: &str) -> (Option<u64>, Option<u64>) {
    let mut primary = None;
    let mut auxiliary = None;

    for caps in bytes_received_pattern().captures_iter(text) {
        let label = &caps[1];
        let value = caps[2].parse::<u64>().ok();
        let slot = if label.eq_ignore_ascii_case("auxiliary") {
            &mut auxiliary
        } else {
            &mut primary
        };
        if slot.is_none() {
            *slot = value;
        }
    }

    match primary {
        Some(_) => (primary, auxiliary),
        None => (None, None),
    }
}

/// True unless the response contains the `Jitter Detected !` marker
///
/// Case is ignored since the device logs `Jitter detected !`; the spacing
/// before `!` is literal.
pub fn parse_jitter_result(text: &str) -> bool {
    !jitter_detected_pattern().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Bytes Received for Primary capture 1024" => (Some(1024), None); "primary only")]
    #[test_case(
        "Bytes Received for Primary capture 1024\nBytes Received for Auxiliary capture 512"
        => (Some(1024), Some(512)); "both counters")]
    #[test_case("Capture Type: Primary, no data" => (None, None); "unrelated text")]
    #[test_case("Bytes Received for Auxiliary capture 77" => (None, None); "auxiliary without primary")]
    #[test_case(
        "Bytes Received for Auxiliary capture 9\r\nBytes Received for Primary capture 40"
        => (Some(40), Some(9)); "order does not matter")]
    #[test_case("Bytes Received for Primary capture 99999999999999999999999" => (None, None); "overflow")]
    fn test_bytes_received(text: &str) -> (Option<u64>, Option<u64>) {
        parse_bytes_received(text)
    }

    #[test_case("Jitter Detected !" => false; "exact marker")]
    #[test_case("ERROR: Jitter detected !" => false; "device casing")]
    #[test_case("[ERROR] jitter DETECTED ! after 3 intervals" => false; "marker inside line")]
    #[test_case("jitter detected!" => true; "no space before bang")]
    #[test_case("Jitter Detected  !" => true; "double space")]
    #[test_case("No jitter detected" => true; "clean run")]
    #[test_case("" => true; "empty response")]
    fn test_jitter_result(text: &str) -> bool {
        parse_jitter_result(text)
    }
}
