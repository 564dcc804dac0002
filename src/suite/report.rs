//! Test run reporting
//!
//! Every test and step is logged as it happens and recorded so the run can
//! be written out as JSON afterwards.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    Failed,
    Skipped(String),
    /// The case stopped on an error before reaching a verdict
    Error(String),
}

impl CaseOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CaseOutcome::Failed | CaseOutcome::Error(_))
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseOutcome::Passed => write!(f, "PASSED"),
            CaseOutcome::Failed => write!(f, "FAILED"),
            CaseOutcome::Skipped(reason) => write!(f, "SKIPPED ({})", reason),
            CaseOutcome::Error(reason) => write!(f, "ERROR ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub description: String,
    pub passed: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    pub outcome: Option<CaseOutcome>,
}

/// Results of one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tests: Vec<TestRecord>,
}

impl Default for TestReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            tests: Vec::new(),
        }
    }

    pub fn test_start(&mut self, name: &str) {
        log::info!("==== Test {} started (run {}) ====", name, self.run_id);
        self.tests.push(TestRecord {
            name: name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            outcome: None,
        });
    }

    pub fn step_start(&self, description: &str) {
        log::info!("[STEP] {}", description);
    }

    /// Record a step verdict and pass it through
    pub fn step_result(&mut self, passed: bool, description: &str) -> bool {
        if passed {
            log::info!("[PASS] {}", description);
        } else {
            log::warn!("[FAIL] {}", description);
        }
        if let Some(test) = self.tests.last_mut() {
            test.steps.push(StepRecord {
                description: description.to_string(),
                passed,
                at: Utc::now(),
            });
        }
        passed
    }

    pub fn test_end(&mut self, outcome: CaseOutcome) {
        if let Some(test) = self.tests.last_mut() {
            log::info!("==== Test {} {} ====", test.name, outcome);
            test.finished_at = Some(Utc::now());
            test.outcome = Some(outcome);
        }
    }

    pub fn passed(&self) -> usize {
        self.count(|outcome| outcome.is_pass())
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| outcome.is_failure())
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, CaseOutcome::Skipped(_)))
    }

    fn count(&self, predicate: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.tests
            .iter()
            .filter(|test| test.outcome.as_ref().map(&predicate).unwrap_or(false))
            .count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
