//! Scenarios: named step sequences with an oracle.
//!
//! A [`Scenario`] is built with [`ScenarioBuilder`], which takes locators as
//! strings and reports the first one that fails to parse from
//! [`build`](ScenarioBuilder::build).
//!
//! ```
//! use logbench_core::scenario::Scenario;
//!
//! let scenario = Scenario::builder("tag-completion", "tag completion")
//!     .create_random_page()
//!     .type_text("textarea >> nth=0", "#fo")
//!     .click(".absolute >> text=foo")
//!     .expect_value("textarea >> nth=0", "#foo")
//!     .build()
//!     .unwrap();
//! assert_eq!(scenario.steps.len(), 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::DriverError;
use crate::locator::{Locator, LocatorError};
use crate::step::{Assertion, Step};

/// Why a scenario run stopped. `step` is the one-based position of the
/// failing step; the oracle counts as the step after the last scripted one.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("step {step}: no element matches '{locator}'")]
    LocatorNotFound { step: usize, locator: String },

    #[error("step {step}: '{locator}' resolved to {count} elements")]
    Ambiguous {
        step: usize,
        locator: String,
        count: usize,
    },

    #[error("step {step}: '{locator}' not visible within {timeout_ms} ms")]
    WaitTimeout {
        step: usize,
        locator: String,
        timeout_ms: u64,
    },

    #[error("step {step}: expected {expected}, got {actual}")]
    AssertionMismatch {
        step: usize,
        expected: String,
        actual: String,
    },

    #[error("step {step}: {source}")]
    Driver {
        step: usize,
        #[source]
        source: DriverError,
    },

    #[error("step {step}: {source}")]
    InvalidLocator {
        step: usize,
        #[source]
        source: LocatorError,
    },
}

impl ScenarioError {
    /// One-based position of the step that failed.
    pub fn step(&self) -> usize {
        match self {
            ScenarioError::LocatorNotFound { step, .. }
            | ScenarioError::Ambiguous { step, .. }
            | ScenarioError::WaitTimeout { step, .. }
            | ScenarioError::AssertionMismatch { step, .. }
            | ScenarioError::Driver { step, .. }
            | ScenarioError::InvalidLocator { step, .. } => *step,
        }
    }
}

/// Whether a scenario may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Active,
    /// Kept for reference; never executed.
    Disabled { reason: String },
}

/// A named end-to-end interaction sequence plus its oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short identifier used on the command line.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Tracker reference of the defect the scenario covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    pub steps: Vec<Step>,
    /// Checked after the last step.
    pub oracle: Assertion,
    pub status: ScenarioStatus,
}

impl Scenario {
    pub fn builder(name: impl Into<String>, title: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.into(),
            title: title.into(),
            issue: None,
            status: ScenarioStatus::Active,
            steps: Vec::new(),
            oracle: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ScenarioStatus::Active
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.status {
            ScenarioStatus::Active => None,
            ScenarioStatus::Disabled { reason } => Some(reason),
        }
    }

    /// Scripted steps followed by the oracle as a final [`Step::Expect`].
    pub fn all_steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps
            .iter()
            .cloned()
            .chain(std::iter::once(Step::Expect(self.oracle.clone())))
    }
}

/// Errors from [`ScenarioBuilder::build`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid locator in step {step}: {source}")]
    Locator {
        step: usize,
        #[source]
        source: LocatorError,
    },

    #[error("scenario '{0}' has no oracle")]
    MissingOracle(String),
}

/// Builder for [`Scenario`].
pub struct ScenarioBuilder {
    name: String,
    title: String,
    issue: Option<String>,
    status: ScenarioStatus,
    steps: Vec<Step>,
    oracle: Option<Assertion>,
    error: Option<BuildError>,
}

impl ScenarioBuilder {
    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.issue = Some(issue.into());
        self
    }

    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.status = ScenarioStatus::Disabled {
            reason: reason.into(),
        };
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    fn locator(&mut self, raw: &str) -> Option<Locator> {
        match Locator::parse(raw) {
            Ok(locator) => Some(locator),
            Err(source) => {
                if self.error.is_none() {
                    self.error = Some(BuildError::Locator {
                        step: self.steps.len() + 1,
                        source,
                    });
                }
                None
            }
        }
    }

    fn push_with(mut self, raw: &str, make: impl FnOnce(Locator) -> Step) -> Self {
        if let Some(locator) = self.locator(raw) {
            self.steps.push(make(locator));
        }
        self
    }

    pub fn create_random_page(self) -> Self {
        self.step(Step::CreateRandomPage)
    }

    pub fn enter_next_block(self) -> Self {
        self.step(Step::EnterNextBlock)
    }

    pub fn type_text(self, locator: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        self.push_with(locator, |locator| Step::TypeText {
            locator,
            text,
            delay_ms: None,
        })
    }

    /// Types with a pause of `delay_ms` before every keystroke.
    pub fn type_text_slowly(self, locator: &str, text: impl Into<String>, delay_ms: u64) -> Self {
        let text = text.into();
        self.push_with(locator, |locator| Step::TypeText {
            locator,
            text,
            delay_ms: Some(delay_ms),
        })
    }

    pub fn press(self, locator: &str, key: impl Into<String>) -> Self {
        self.press_times(locator, key, 1)
    }

    /// Presses `key` `times` times, one step per press.
    pub fn press_times(mut self, locator: &str, key: impl Into<String>, times: usize) -> Self {
        let key = key.into();
        if let Some(locator) = self.locator(locator) {
            for _ in 0..times {
                self.steps.push(Step::Press {
                    locator: locator.clone(),
                    key: key.clone(),
                });
            }
        }
        self
    }

    pub fn keyboard_press(self, chord: impl Into<String>) -> Self {
        self.step(Step::KeyboardPress {
            chord: chord.into(),
        })
    }

    pub fn click(self, locator: &str) -> Self {
        self.push_with(locator, |locator| Step::Click { locator })
    }

    /// Waits with the runner's default timeout.
    pub fn wait_for_visible(self, locator: &str) -> Self {
        self.push_with(locator, |locator| Step::WaitForVisible {
            locator,
            timeout_ms: None,
        })
    }

    pub fn expect_count(self, locator: &str, expected: usize) -> Self {
        self.push_with(locator, |locator| {
            Step::Expect(Assertion::Count { locator, expected })
        })
    }

    pub fn comment(self, text: impl Into<String>) -> Self {
        self.step(Step::Comment(text.into()))
    }

    /// Sets the oracle: the field at `locator` must equal `expected`.
    pub fn expect_value(mut self, locator: &str, expected: impl Into<String>) -> Self {
        if let Some(locator) = self.locator(locator) {
            self.oracle = Some(Assertion::InputValue {
                locator,
                expected: expected.into(),
            });
        }
        self
    }

    pub fn build(self) -> Result<Scenario, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let oracle = self
            .oracle
            .ok_or_else(|| BuildError::MissingOracle(self.name.clone()))?;
        Ok(Scenario {
            name: self.name,
            title: self.title,
            issue: self.issue,
            steps: self.steps,
            oracle,
            status: self.status,
        })
    }
}
