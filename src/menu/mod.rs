//! On-device test menu navigation

pub mod grammar;
pub mod mock;
pub mod navigator;

pub use grammar::{find_entry, parse_listing, ListingEntry, MenuGrammar, PromptAnswer};
pub use mock::MockCaptureMenu;
pub use navigator::{MenuNavigator, SuiteNavigator};
