//! [`AutomationDriver`] implementation backed by the browser agent.
//!
//! [`AgentDriver`] implements the [`AutomationDriver`] trait by talking to
//! the in-browser automation agent over TCP with the protocol defined in
//! [`crate::protocol`]. Locators are sent as strings and resolved by the
//! agent; waits and counts run agent-side.
//!
//! # Example
//!
//! ```no_run
//! use logbench_core::agent_driver::AgentDriver;
//! use logbench_core::driver::AutomationDriver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut driver = AgentDriver::new("127.0.0.1", 9223);
//! driver.connect().await?;
//! driver.open_page("scratch").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tracing::{debug, instrument};

use crate::agent_client::{AgentClient, AgentClientError, READ_TIMEOUT};
use crate::driver::{AutomationDriver, DriverError};
use crate::element::UIElement;
use crate::locator::Locator;
use crate::protocol::{Request, Response};

/// Extra read time granted on top of an agent-side wait.
const WAIT_READ_MARGIN: Duration = Duration::from_secs(5);

/// Maps an [`AgentClientError`] to a [`DriverError`].
fn map_client_error(err: AgentClientError) -> DriverError {
    match err {
        AgentClientError::NotConnected => DriverError::NotConnected,
        AgentClientError::ConnectionFailed(msg) => DriverError::ConnectionLost(msg),
        AgentClientError::Io(e) => DriverError::Io(e),
        AgentClientError::Protocol(e) => DriverError::CommandFailed(e.to_string()),
        AgentClientError::AgentError(msg) => DriverError::CommandFailed(msg),
        AgentClientError::Timeout => DriverError::Timeout,
    }
}

/// Classifies an agent error message about `selector`.
///
/// The agent reports `not found`, `strict mode violation: resolved to N
/// elements` and `timeout` conditions as text; everything else stays a
/// [`DriverError::CommandFailed`].
fn classify_agent_error(selector: &str, message: String) -> DriverError {
    let lower = message.to_lowercase();
    if lower.contains("strict mode violation") {
        let count = lower
            .split("resolved to")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        DriverError::Ambiguous {
            locator: selector.to_string(),
            count,
        }
    } else if lower.contains("not found") {
        DriverError::ElementNotFound(selector.to_string())
    } else if lower.contains("timeout") || lower.contains("timed out") {
        DriverError::Timeout
    } else {
        DriverError::CommandFailed(message)
    }
}

/// Checks that the response is [`Response::Ok`].
fn expect_ok(response: Response) -> Result<(), DriverError> {
    match response {
        Response::Ok => Ok(()),
        other => Err(DriverError::CommandFailed(format!(
            "unexpected response: {other:?}"
        ))),
    }
}

/// An [`AutomationDriver`] backed by a TCP connection to the browser agent.
///
/// The client is created lazily by [`connect`](AutomationDriver::connect)
/// and wrapped in a [`tokio::sync::Mutex`] so the `&self` trait methods can
/// send requests. The mutex also keeps request/response pairs in order.
pub struct AgentDriver {
    host: String,
    port: u16,
    client: Mutex<Option<AgentClient>>,
}

impl AgentDriver {
    /// Creates a driver for the given host and port.
    ///
    /// No connection is established until [`connect`](AutomationDriver::connect) is called.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: Mutex::new(None),
        }
    }

    /// Returns the configured host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Creates a new [`AgentClient`] and verifies it with a heartbeat.
    async fn create_client(&self) -> Result<AgentClient, DriverError> {
        let host_port = format!("{}:{}", self.host, self.port);
        let addr = tokio::net::lookup_host(&host_port)
            .await
            .map_err(|e| DriverError::ConnectionLost(e.to_string()))?
            .next()
            .ok_or_else(|| DriverError::ConnectionLost(format!("could not resolve {host_port}")))?;

        let mut client = AgentClient::new(addr);
        client.connect().await.map_err(map_client_error)?;
        client.heartbeat().await.map_err(map_client_error)?;
        Ok(client)
    }

    async fn send(&self, request: &Request) -> Result<Response, DriverError> {
        self.send_with_read_timeout(request, READ_TIMEOUT)
            .await
            .map_err(map_client_error)
    }

    /// Sends a request that targets `selector`, classifying agent errors.
    async fn send_targeted(
        &self,
        request: &Request,
        selector: &str,
        read_timeout: Duration,
    ) -> Result<Response, DriverError> {
        self.send_with_read_timeout(request, read_timeout)
            .await
            .map_err(|e| match e {
                AgentClientError::AgentError(msg) => classify_agent_error(selector, msg),
                other => map_client_error(other),
            })
    }

    async fn send_with_read_timeout(
        &self,
        request: &Request,
        read_timeout: Duration,
    ) -> Result<Response, AgentClientError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(AgentClientError::NotConnected)?;
        client.send_with_timeout(request, read_timeout).await
    }
}

#[async_trait]
impl AutomationDriver for AgentDriver {
    #[instrument(skip(self), level = "debug")]
    async fn connect(&mut self) -> Result<(), DriverError> {
        let client = self.create_client().await?;
        *self.client.lock().await = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|g| g.as_ref().map_or(false, AgentClient::is_connected))
            .unwrap_or(false)
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_page(&self, title: &str) -> Result<(), DriverError> {
        let response = self
            .send(&Request::OpenPage {
                title: title.to_string(),
            })
            .await?;
        expect_ok(response)
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn type_text(
        &self,
        locator: &Locator,
        text: &str,
        delay: Option<Duration>,
    ) -> Result<(), DriverError> {
        let delay_ms = delay.map(|d| d.as_millis().min(u32::MAX as u128) as u32);
        // Typing with a per-key delay takes roughly len * delay on the agent.
        let typing_time = delay
            .map(|d| d * text.chars().count() as u32)
            .unwrap_or_default();
        let response = self
            .send_targeted(
                &Request::TypeText {
                    selector: locator.to_string(),
                    text: text.to_string(),
                    delay_ms,
                },
                locator.as_str(),
                READ_TIMEOUT + typing_time,
            )
            .await?;
        expect_ok(response)
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn press_key(&self, locator: &Locator, key: &str) -> Result<(), DriverError> {
        let response = self
            .send_targeted(
                &Request::PressKey {
                    selector: locator.to_string(),
                    key: key.to_string(),
                },
                locator.as_str(),
                READ_TIMEOUT,
            )
            .await?;
        expect_ok(response)
    }

    async fn keyboard_press(&self, chord: &str) -> Result<(), DriverError> {
        let response = self
            .send(&Request::KeyboardPress {
                chord: chord.to_string(),
            })
            .await?;
        expect_ok(response)
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        let response = self
            .send_targeted(
                &Request::Click {
                    selector: locator.to_string(),
                },
                locator.as_str(),
                READ_TIMEOUT,
            )
            .await?;
        expect_ok(response)
    }

    async fn input_value(&self, locator: &Locator) -> Result<Option<String>, DriverError> {
        let response = self
            .send_targeted(
                &Request::InputValue {
                    selector: locator.to_string(),
                },
                locator.as_str(),
                READ_TIMEOUT,
            )
            .await?;
        match response {
            Response::Value { value } => Ok(value),
            other => Err(DriverError::CommandFailed(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        match self.send(&Request::DumpTree).await? {
            Response::Tree { json } => {
                let elements: Vec<UIElement> = serde_json::from_str(&json)
                    .map_err(|e| DriverError::JsonParse(e.to_string()))?;
                debug!(root_count = elements.len(), "tree dumped");
                Ok(elements)
            }
            other => Err(DriverError::CommandFailed(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }

    async fn count(&self, locator: &Locator) -> Result<usize, DriverError> {
        let response = self
            .send_targeted(
                &Request::Count {
                    selector: locator.to_string(),
                },
                locator.as_str(),
                READ_TIMEOUT,
            )
            .await?;
        match response {
            Response::Count { count } => Ok(count as usize),
            other => Err(DriverError::CommandFailed(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }

    /// Waits agent-side; the read deadline is the wait plus a fixed margin.
    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn wait_for_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<UIElement, DriverError> {
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        let response = self
            .send_targeted(
                &Request::WaitForSelector {
                    selector: locator.to_string(),
                    timeout_ms,
                },
                locator.as_str(),
                timeout + WAIT_READ_MARGIN,
            )
            .await?;
        match response {
            Response::Tree { json } => {
                serde_json::from_str(&json).map_err(|e| DriverError::JsonParse(e.to_string()))
            }
            other => Err(DriverError::CommandFailed(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }
}
