//! Interaction steps, assertions and step logging.
//!
//! A [`Step`] is one scripted interaction with the application under test.
//! Scenarios are ordered lists of steps followed by an oracle
//! [`Assertion`]. Every executed step is recorded as a [`StepLog`].
//!
//! # Step Types
//!
//! - **Helpers**: [`Step::CreateRandomPage`], [`Step::EnterNextBlock`]
//! - **Input**: [`Step::TypeText`], [`Step::Press`], [`Step::KeyboardPress`], [`Step::Click`]
//! - **Waiting**: [`Step::WaitForVisible`]
//! - **Checks**: [`Step::Expect`]
//! - **Logging**: [`Step::Comment`]
//!
//! # Example
//!
//! ```
//! use logbench_core::locator::Locator;
//! use logbench_core::step::{Step, StepLog, StepOutcome};
//!
//! let step = Step::Press {
//!     locator: Locator::parse("textarea >> nth=0").unwrap(),
//!     key: "ArrowLeft".to_string(),
//! };
//!
//! let log = StepLog::new(4, step, StepOutcome::Success, 3);
//! println!("Step {} at {}", log.id, log.timestamp);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locator::Locator;

/// A predicate over the application's visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// The form field matched by `locator` holds exactly `expected`.
    InputValue { locator: Locator, expected: String },
    /// Exactly `expected` elements match `locator`.
    Count { locator: Locator, expected: usize },
}

impl Assertion {
    pub fn locator(&self) -> &Locator {
        match self {
            Assertion::InputValue { locator, .. } | Assertion::Count { locator, .. } => locator,
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::InputValue { locator, expected } => {
                write!(f, "value of {locator} is {expected:?}")
            }
            Assertion::Count { locator, expected } => {
                write!(f, "{locator} matches {expected} element(s)")
            }
        }
    }
}

/// One scripted interaction.
///
/// Steps serialize as `{"type": "...", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Step {
    /// Open a new, empty page with a random title.
    CreateRandomPage,

    /// Commit the edited block and move to a new empty block below it.
    EnterNextBlock,

    /// Type text key by key into a field.
    TypeText {
        locator: Locator,
        text: String,
        /// Pause before each keystroke.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },

    /// Press a named key on an element.
    Press { locator: Locator, key: String },

    /// Press a key chord on the page keyboard.
    KeyboardPress { chord: String },

    /// Click an element.
    Click { locator: Locator },

    /// Wait until an element is visible.
    WaitForVisible {
        locator: Locator,
        /// Maximum wait; the runner's default when `None`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Check an assertion; a mismatch fails the scenario.
    Expect(Assertion),

    /// Record a note in the log without touching the application.
    Comment(String),
}

impl Step {
    /// Returns a short, static name for this step type suitable for use in
    /// tracing span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Step::CreateRandomPage => "create_random_page",
            Step::EnterNextBlock => "enter_next_block",
            Step::TypeText { .. } => "type_text",
            Step::Press { .. } => "press",
            Step::KeyboardPress { .. } => "keyboard_press",
            Step::Click { .. } => "click",
            Step::WaitForVisible { .. } => "wait_for_visible",
            Step::Expect(_) => "expect",
            Step::Comment(_) => "comment",
        }
    }

    /// The locator this step targets, if any.
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Step::TypeText { locator, .. }
            | Step::Press { locator, .. }
            | Step::Click { locator }
            | Step::WaitForVisible { locator, .. } => Some(locator),
            Step::Expect(assertion) => Some(assertion.locator()),
            Step::CreateRandomPage
            | Step::EnterNextBlock
            | Step::KeyboardPress { .. }
            | Step::Comment(_) => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CreateRandomPage => f.write_str("create a random page"),
            Step::EnterNextBlock => f.write_str("enter the next block"),
            Step::TypeText {
                locator,
                text,
                delay_ms: Some(delay),
            } => write!(f, "type {text:?} into {locator} ({delay} ms/key)"),
            Step::TypeText { locator, text, .. } => write!(f, "type {text:?} into {locator}"),
            Step::Press { locator, key } => write!(f, "press {key} on {locator}"),
            Step::KeyboardPress { chord } => write!(f, "press {chord}"),
            Step::Click { locator } => write!(f, "click {locator}"),
            Step::WaitForVisible { locator, .. } => write!(f, "wait for {locator}"),
            Step::Expect(assertion) => write!(f, "expect {assertion}"),
            Step::Comment(text) => write!(f, "# {text}"),
        }
    }
}

/// The result of executing a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The step completed successfully.
    Success,

    /// The step failed with the given error message.
    Failure(String),
}

/// A logged step with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLog {
    /// Unique identifier for this log entry.
    pub id: Uuid,

    /// When the step finished.
    pub timestamp: DateTime<Utc>,

    /// Zero-based position of the step in its scenario. The oracle comes
    /// after the last scripted step.
    pub index: usize,

    /// The step that was executed.
    pub step: Step,

    /// The result of the step.
    pub outcome: StepOutcome,

    /// How long the step took in milliseconds.
    pub duration_ms: u64,
}

impl StepLog {
    /// Creates a new log entry with a fresh UUID and the current time.
    pub fn new(index: usize, step: Step, outcome: StepOutcome, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            index,
            step,
            outcome,
            duration_ms,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}
