//! CUnit console menu grammar
//!
//! The device test binary runs the CUnit console runner. Suites and tests
//! are listed as numbered lines, selected by number, and each level ends
//! with a command prompt.

use std::sync::OnceLock;

use regex::Regex;

/// Prompts and keys of the console runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuGrammar {
    pub command_prompt: String,
    pub suite_prompt: String,
    pub test_prompt: String,
    pub select_key: String,
    pub up_key: String,
    pub quit_key: String,
}

impl Default for MenuGrammar {
    fn default() -> Self {
        MenuGrammar {
            command_prompt: "Enter command: ".to_string(),
            suite_prompt: "Enter number of suite to select".to_string(),
            test_prompt: "Enter number of test to select".to_string(),
            select_key: "s".to_string(),
            up_key: "u".to_string(),
            quit_key: "q".to_string(),
        }
    }
}

/// One question the test entry asks and the answer to type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAnswer {
    pub query: String,
    pub input: String,
}

impl PromptAnswer {
    pub fn new(query: impl Into<String>, input: impl ToString) -> Self {
        Self {
            query: query.into(),
            input: input.to_string(),
        }
    }
}

/// A numbered line of a suite or test listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub number: u32,
    pub name: String,
}

fn listing_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*(\d+)\.\s+(.+?)\s*$").expect("valid listing pattern"))
}

fn column_gap() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s{2,}").expect("valid column pattern"))
}

/// Parse numbered entries out of a listing
///
/// Only the first column is kept as the name; columns are separated by two
/// or more spaces.
pub fn parse_listing(text: &str) -> Vec<ListingEntry> {
    listing_line()
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps[1].parse().ok()?;
            let name = column_gap().split(&caps[2]).next()?.trim().to_string();
            Some(ListingEntry { number, name })
        })
        .collect()
}

/// Number of the entry whose name matches exactly
pub fn find_entry(listing: &[ListingEntry], name: &str) -> Option<u32> {
    listing.iter().find(|entry| entry.name == name).map(|entry| entry.number)
}
