//! Suite/test navigation over a console
//!
//! `select` walks main menu -> suite -> test, answers the test's prompts
//! in order, returns the test output, and climbs back to the main menu so
//! the next selection starts from a known place.

use crate::error::{Result, RmfAudioError};
use crate::menu::grammar::{find_entry, parse_listing, MenuGrammar, PromptAnswer};
use crate::remote::console::Console;

/// Something that can run a named test entry of a suite
pub trait MenuNavigator {
    /// Run `test` in `suite`, answering `prompts` in order, and return its output
    fn select(&mut self, suite: &str, test: &str, prompts: &[PromptAnswer]) -> Result<String>;
}

impl<N: MenuNavigator + ?Sized> MenuNavigator for &mut N {
    fn select(&mut self, suite: &str, test: &str, prompts: &[PromptAnswer]) -> Result<String> {
        (**self).select(suite, test, prompts)
    }
}

/// Drives the CUnit console runner of the device test binary
pub struct SuiteNavigator<C: Console> {
    console: C,
    grammar: MenuGrammar,
    running: bool,
}

impl<C: Console> SuiteNavigator<C> {
    pub fn new(console: C) -> Self {
        Self::with_grammar(console, MenuGrammar::default())
    }

    pub fn with_grammar(console: C, grammar: MenuGrammar) -> Self {
        Self {
            console,
            grammar,
            running: false,
        }
    }

    /// Launch the test binary and wait for its main menu
    pub fn start(&mut self, launch_command: &str) -> Result<()> {
        log::info!("Launching test menu: {}", launch_command);
        self.console.send_line(launch_command)?;
        self.console.read_until(&self.grammar.command_prompt)?;
        self.running = true;
        Ok(())
    }

    /// Quit the test binary
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        log::info!("Quitting test menu");
        self.console.send_line(&self.grammar.quit_key)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    fn choose(&mut self, prompt: &str, wanted: &str) -> Result<()> {
        self.console.send_line(&self.grammar.select_key)?;
        let listing = self.console.read_until(prompt)?;
        let number = find_entry(&parse_listing(&listing), wanted).ok_or_else(|| {
            RmfAudioError::MenuEntryNotFound {
                entry: wanted.to_string(),
            }
        });
        match number {
            Ok(number) => self.console.send_line(&number.to_string()),
            Err(err) => {
                // Leave the selection prompt with an empty answer
                self.console.send_line("")?;
                self.console.read_until(&self.grammar.command_prompt)?;
                Err(err)
            }
        }
    }
}

impl<C: Console> MenuNavigator for SuiteNavigator<C> {
    fn select(&mut self, suite: &str, test: &str, prompts: &[PromptAnswer]) -> Result<String> {
        if !self.running {
            return Err(RmfAudioError::MenuNotRunning);
        }
        log::debug!("Selecting '{}' in suite '{}'", test, suite);

        let suite_prompt = self.grammar.suite_prompt.clone();
        let test_prompt = self.grammar.test_prompt.clone();
        let command_prompt = self.grammar.command_prompt.clone();

        self.choose(&suite_prompt, suite)?;
        self.console.read_until(&command_prompt)?;

        if let Err(err) = self.choose(&test_prompt, test) {
            self.console.send_line(&self.grammar.up_key)?;
            self.console.read_until(&command_prompt)?;
            return Err(err);
        }

        let mut output = String::new();
        for prompt in prompts {
            output.push_str(&self.console.read_until(prompt.query.trim())?);
            self.console.send_line(&prompt.input)?;
        }
        output.push_str(&self.console.read_until(&command_prompt)?);

        self.console.send_line(&self.grammar.up_key)?;
        self.console.read_until(&command_prompt)?;
        Ok(output)
    }
}

impl<C: Console> Drop for SuiteNavigator<C> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("Failed to quit test menu: {}", err);
        }
    }
}
