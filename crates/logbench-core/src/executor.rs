//! Step execution against an automation driver.
//!
//! [`StepExecutor`] holds an [`AutomationDriver`] and runs one [`Step`] at a
//! time, turning driver errors into [`ScenarioError`]s that name the step
//! and locator involved.
//!
//! # Example
//!
//! ```no_run
//! use logbench_core::driver::DriverConfig;
//! use logbench_core::executor::StepExecutor;
//! use logbench_core::step::Step;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = StepExecutor::from_config_connected(DriverConfig::Simulated)
//!         .await
//!         .unwrap();
//!
//!     if let Err(e) = executor.execute(1, &Step::CreateRandomPage).await {
//!         eprintln!("{e}");
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::agent_driver::AgentDriver;
use crate::driver::{AutomationDriver, DriverConfig, DriverError};
use crate::locator::Locator;
use crate::scenario::ScenarioError;
use crate::sim::SimDriver;
use crate::step::{Assertion, Step};

/// Wait applied when a step does not carry its own timeout.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Editor of the first block on the page.
pub const FIRST_EDITOR: &str = "textarea >> nth=0";

/// Length of titles generated by [`random_page_title`].
pub const PAGE_TITLE_LEN: usize = 20;

/// A fresh alphanumeric page title.
pub fn random_page_title() -> String {
    let mut title = Uuid::new_v4().simple().to_string();
    title.truncate(PAGE_TITLE_LEN);
    title
}

/// Executes scenario steps against a driver.
pub struct StepExecutor {
    driver: Arc<dyn AutomationDriver>,
    wait_timeout: Duration,
}

impl StepExecutor {
    /// Creates an executor over an already configured driver.
    pub fn new(driver: Arc<dyn AutomationDriver>) -> Self {
        Self {
            driver,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Create an executor from a [`DriverConfig`].
    ///
    /// The driver is **not** connected yet; use
    /// [`from_config_connected`](Self::from_config_connected) for that.
    pub fn from_config(config: DriverConfig) -> Self {
        match config {
            DriverConfig::Agent { host, port } => Self::new(Arc::new(AgentDriver::new(host, port))),
            DriverConfig::Simulated => Self::new(Arc::new(SimDriver::new())),
        }
    }

    /// Like [`from_config`](Self::from_config) but connects immediately.
    pub async fn from_config_connected(config: DriverConfig) -> Result<Self, DriverError> {
        match config {
            DriverConfig::Agent { host, port } => {
                let mut driver = AgentDriver::new(host, port);
                driver.connect().await?;
                Ok(Self::new(Arc::new(driver)))
            }
            DriverConfig::Simulated => {
                let mut driver = SimDriver::new();
                driver.connect().await?;
                Ok(Self::new(Arc::new(driver)))
            }
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn driver(&self) -> &Arc<dyn AutomationDriver> {
        &self.driver
    }

    /// Executes `step`, the `number`-th (one-based) step of its scenario.
    pub async fn execute(&self, number: usize, step: &Step) -> Result<(), ScenarioError> {
        let span = info_span!("execute_step", step = number, kind = step.name());
        async {
            let start = Instant::now();
            let result = self.execute_inner(number, step).await;
            debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                success = result.is_ok(),
                "step complete"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, number: usize, step: &Step) -> Result<(), ScenarioError> {
        let fail = |err: DriverError| map_driver_error(number, err);
        match step {
            Step::CreateRandomPage => {
                let title = random_page_title();
                self.driver.open_page(&title).await.map_err(fail)?;
                let editor = parse(number, FIRST_EDITOR)?;
                self.wait(number, &editor, self.wait_timeout).await?;
                info!(page = %title, "page created");
                Ok(())
            }

            Step::EnterNextBlock => {
                let blocks = parse(number, ".ls-block")?;
                let count = self.driver.count(&blocks).await.map_err(fail)?;
                let editor = parse(number, FIRST_EDITOR)?;
                self.driver.press_key(&editor, "Enter").await.map_err(fail)?;
                let next = parse(number, &format!(".ls-block >> nth={count} >> textarea"))?;
                self.wait(number, &next, self.wait_timeout).await
            }

            Step::TypeText {
                locator,
                text,
                delay_ms,
            } => self
                .driver
                .type_text(locator, text, delay_ms.map(Duration::from_millis))
                .await
                .map_err(fail),

            Step::Press { locator, key } => self.driver.press_key(locator, key).await.map_err(fail),

            Step::KeyboardPress { chord } => self.driver.keyboard_press(chord).await.map_err(fail),

            Step::Click { locator } => self.driver.click(locator).await.map_err(fail),

            Step::WaitForVisible {
                locator,
                timeout_ms,
            } => {
                let timeout = timeout_ms.map_or(self.wait_timeout, Duration::from_millis);
                self.wait(number, locator, timeout).await
            }

            Step::Expect(Assertion::InputValue { locator, expected }) => {
                let actual = self.driver.input_value(locator).await.map_err(fail)?;
                match actual {
                    Some(ref value) if value == expected => Ok(()),
                    other => Err(ScenarioError::AssertionMismatch {
                        step: number,
                        expected: format!("{expected:?}"),
                        actual: other.map_or_else(|| "no value".to_string(), |v| format!("{v:?}")),
                    }),
                }
            }

            Step::Expect(Assertion::Count { locator, expected }) => {
                let actual = self.driver.count(locator).await.map_err(fail)?;
                if actual == *expected {
                    Ok(())
                } else {
                    Err(ScenarioError::AssertionMismatch {
                        step: number,
                        expected: format!("{expected} match(es) for {locator}"),
                        actual: actual.to_string(),
                    })
                }
            }

            Step::Comment(text) => {
                info!(comment = %text, "comment");
                Ok(())
            }
        }
    }

    async fn wait(&self, number: usize, locator: &Locator, timeout: Duration) -> Result<(), ScenarioError> {
        match self.driver.wait_for_visible(locator, timeout).await {
            Ok(_) => Ok(()),
            Err(DriverError::Timeout) => Err(ScenarioError::WaitTimeout {
                step: number,
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(e) => Err(map_driver_error(number, e)),
        }
    }
}

fn parse(number: usize, raw: &str) -> Result<Locator, ScenarioError> {
    Locator::parse(raw).map_err(|source| ScenarioError::InvalidLocator {
        step: number,
        source,
    })
}

/// Maps a driver failure to the scenario failure taxonomy.
fn map_driver_error(step: usize, err: DriverError) -> ScenarioError {
    match err {
        DriverError::ElementNotFound(locator) => ScenarioError::LocatorNotFound { step, locator },
        DriverError::Ambiguous { locator, count } => ScenarioError::Ambiguous {
            step,
            locator,
            count,
        },
        DriverError::InvalidLocator(source) => ScenarioError::InvalidLocator { step, source },
        source => ScenarioError::Driver { step, source },
    }
}
