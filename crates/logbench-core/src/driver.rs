//! The capability interface scenarios drive the application through.
//!
//! This module defines the [`AutomationDriver`] trait, the capability
//! interface scenarios are written against. Two backends implement it: a TCP
//! client talking to an in-browser automation agent
//! ([`AgentDriver`](crate::agent_driver::AgentDriver)) and an in-process
//! simulated editor ([`SimDriver`](crate::sim::SimDriver)) used to exercise
//! scenario logic without a live application.
//!
//! # Backend Selection
//!
//! [`DriverConfig`] picks the backend at runtime:
//!
//! ```
//! use logbench_core::driver::DriverConfig;
//!
//! // A browser agent listening on localhost
//! let config = DriverConfig::Agent {
//!     host: "127.0.0.1".to_string(),
//!     port: 9223,
//! };
//!
//! // The in-process simulated editor
//! let config = DriverConfig::Simulated;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::element::UIElement;
use crate::locator::{Locator, LocatorError};

/// Interval between visibility polls in the default
/// [`wait_for_visible`](AutomationDriver::wait_for_visible).
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failure of a driver operation, whatever the backend.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("No element matches '{0}'")]
    ElementNotFound(String),

    /// An action's locator matched more than one element.
    #[error("Strict mode violation: '{locator}' resolved to {count} elements")]
    Ambiguous { locator: String, count: usize },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Not connected to automation backend")]
    NotConnected,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A wait or an agent read ran past its bound.
    #[error("Operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The agent sent an element tree that does not parse.
    #[error("Bad element tree: {0}")]
    JsonParse(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),
}

/// Which backend to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverConfig {
    /// The in-browser agent listening at `host:port`.
    Agent { host: String, port: u16 },
    Simulated,
}

/// Resolves `locator` against `tree` and requires exactly one match.
///
/// This is the strictness rule every action applies: zero matches is
/// [`DriverError::ElementNotFound`], more than one is
/// [`DriverError::Ambiguous`].
pub fn resolve_one<'a>(tree: &'a [UIElement], locator: &Locator) -> Result<&'a UIElement, DriverError> {
    let found = locator.resolve(tree);
    match found.len() {
        0 => Err(DriverError::ElementNotFound(locator.to_string())),
        1 => Ok(found[0]),
        count => Err(DriverError::Ambiguous {
            locator: locator.to_string(),
            count,
        }),
    }
}

/// Trait for backend-agnostic automation of the notes application.
///
/// Implementors provide the input primitives (open a page, type, press a
/// key, click, read a field) using their specific backend. The trait
/// includes default implementations for element lookup, counting and
/// waiting that work by fetching the rendered tree via
/// [`dump_tree`](AutomationDriver::dump_tree) and resolving locators
/// locally. Backends that support server-side lookup can override these.
///
/// Actions are strict: a locator that resolves to zero or several elements
/// fails with [`DriverError::ElementNotFound`] or [`DriverError::Ambiguous`].
/// Lookups, counts and waits are not strict.
///
/// # Required Methods
///
/// Implementors must provide: [`connect`](AutomationDriver::connect),
/// [`is_connected`](AutomationDriver::is_connected),
/// [`open_page`](AutomationDriver::open_page),
/// [`type_text`](AutomationDriver::type_text),
/// [`press_key`](AutomationDriver::press_key),
/// [`keyboard_press`](AutomationDriver::keyboard_press),
/// [`click`](AutomationDriver::click),
/// [`input_value`](AutomationDriver::input_value),
/// and [`dump_tree`](AutomationDriver::dump_tree).
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Establish connection to the automation backend.
    async fn connect(&mut self) -> Result<(), DriverError>;

    /// Check if the backend is ready to accept commands.
    fn is_connected(&self) -> bool;

    /// Create a new page with the given title and navigate to it.
    ///
    /// The new page holds one empty block in editing mode.
    async fn open_page(&self, title: &str) -> Result<(), DriverError>;

    /// Type text into the element matched by `locator`, one key at a time.
    ///
    /// # Arguments
    ///
    /// * `locator` - The target field
    /// * `text` - The text to type
    /// * `delay` - Optional pause before each keystroke
    async fn type_text(
        &self,
        locator: &Locator,
        text: &str,
        delay: Option<Duration>,
    ) -> Result<(), DriverError>;

    /// Press a single named key (e.g. `ArrowLeft`, `Enter`) on the element
    /// matched by `locator`.
    async fn press_key(&self, locator: &Locator, key: &str) -> Result<(), DriverError>;

    /// Press a key chord on the page keyboard, e.g. `Meta+c`.
    async fn keyboard_press(&self, chord: &str) -> Result<(), DriverError>;

    /// Click the element matched by `locator`.
    async fn click(&self, locator: &Locator) -> Result<(), DriverError>;

    /// Read the current value of the form field matched by `locator`.
    ///
    /// # Returns
    ///
    /// `Ok(Some(String))` for a field with a value, `Ok(None)` if the
    /// element is not a form field.
    async fn input_value(&self, locator: &Locator) -> Result<Option<String>, DriverError>;

    /// Get the full rendered element tree.
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError>;

    /// Find the first element matching `locator`.
    ///
    /// The default implementation calls [`dump_tree`](Self::dump_tree) and
    /// resolves the locator locally.
    async fn find_element(&self, locator: &Locator) -> Result<Option<UIElement>, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(locator.resolve(&tree).first().map(|e| (*e).clone()))
    }

    /// Count the elements matching `locator`.
    ///
    /// The default implementation calls [`dump_tree`](Self::dump_tree) and
    /// resolves the locator locally.
    async fn count(&self, locator: &Locator) -> Result<usize, DriverError> {
        let tree = self.dump_tree().await?;
        Ok(locator.resolve(&tree).len())
    }

    /// Wait until an element matching `locator` exists and is visible.
    ///
    /// The default implementation polls [`find_element`](Self::find_element)
    /// every [`POLL_INTERVAL`] and gives up with [`DriverError::Timeout`]
    /// once `timeout` has elapsed. Lookup errors other than a missing
    /// element are returned immediately.
    async fn wait_for_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<UIElement, DriverError> {
        let start = Instant::now();
        loop {
            if let Some(element) = self.find_element(locator).await? {
                if element.visible {
                    return Ok(element);
                }
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
