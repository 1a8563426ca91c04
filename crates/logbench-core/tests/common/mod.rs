//! Shared test helpers for logbench-core integration tests.
//!
//! This module provides mock agents for tests that exercise the TCP agent
//! protocol: canned responses, scripted per-request behaviors, and an agent
//! that serves requests from a simulated editor.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use logbench_core::agent_driver::AgentDriver;
use logbench_core::driver::{AutomationDriver, DriverError};
use logbench_core::executor::StepExecutor;
use logbench_core::locator::Locator;
use logbench_core::protocol::{decode_request, encode_response, read_frame_length, Request, Response};
use logbench_core::runner::ScenarioRunner;
use logbench_core::sim::{SimDriver, SimOptions};

/// Wait bound used by test runners.
pub const TEST_WAIT: Duration = Duration::from_millis(1500);

/// Read one request frame, returning `None` once the peer is gone.
async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = read_frame_length(&header) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.ok()?;
    decode_request(&payload).ok()
}

async fn write_response(stream: &mut TcpStream, response: &Response) {
    let _ = stream.write_all(&encode_response(response)).await;
    let _ = stream.flush().await;
}

// ---------------------------------------------------------------------------
// Canned responses
// ---------------------------------------------------------------------------

/// Start a mock TCP agent that accepts one connection and answers each
/// request with the next canned response. The first response is consumed by
/// the heartbeat that `AgentDriver::connect()` sends.
///
/// Every decoded request is forwarded on the returned channel.
pub async fn mock_agent(responses: Vec<Response>) -> (SocketAddr, mpsc::UnboundedReceiver<Request>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for response in responses {
            let Some(request) = read_request(&mut stream).await else {
                return;
            };
            let _ = tx.send(request);
            write_response(&mut stream, &response).await;
        }
    });

    (addr, rx)
}

/// Convenience: an executor whose AgentDriver is connected to a
/// [`mock_agent`].
pub async fn connected_executor(
    responses: Vec<Response>,
) -> (StepExecutor, mpsc::UnboundedReceiver<Request>) {
    let (addr, rx) = mock_agent(responses).await;
    let mut driver = AgentDriver::new(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    (
        StepExecutor::new(Arc::new(driver)).with_wait_timeout(TEST_WAIT),
        rx,
    )
}

// ---------------------------------------------------------------------------
// Programmable mock agent
// ---------------------------------------------------------------------------

/// Describes the behavior a mock agent should exhibit for a single incoming
/// request frame.
pub enum MockBehavior {
    /// Read one request frame and reply with the given response.
    Respond(Response),
    /// Read one request frame, sleep for `Duration`, then reply.
    Delay(Duration, Response),
    /// Read one request frame and then close the connection.
    Drop,
    /// Read one request frame and send invalid (non-protocol) bytes.
    SendGarbage,
    /// Read one request frame and never answer.
    Hang,
}

/// Start a mock TCP agent whose behavior is scripted per-request.
///
/// The agent accepts exactly one connection and processes each
/// `MockBehavior` entry in sequence, then closes the connection.
pub async fn programmable_mock_agent(behaviors: Vec<MockBehavior>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        for behavior in behaviors {
            if read_request(&mut stream).await.is_none() {
                return;
            }
            match behavior {
                MockBehavior::Respond(response) => write_response(&mut stream, &response).await,
                MockBehavior::Delay(duration, response) => {
                    tokio::time::sleep(duration).await;
                    write_response(&mut stream, &response).await;
                }
                MockBehavior::Drop => return,
                MockBehavior::SendGarbage => {
                    // A frame whose opcode is not part of the protocol.
                    let garbage = [0x04, 0x00, 0x00, 0x00, 0xDE, 0xAD, 0xBE, 0xEF];
                    let _ = stream.write_all(&garbage).await;
                    let _ = stream.flush().await;
                }
                MockBehavior::Hang => std::future::pending::<()>().await,
            }
        }
    });

    addr
}

/// An executor connected to a [`programmable_mock_agent`]. The first
/// behavior should answer the connect heartbeat.
pub async fn programmable_executor(behaviors: Vec<MockBehavior>) -> StepExecutor {
    let addr = programmable_mock_agent(behaviors).await;
    let mut driver = AgentDriver::new(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    StepExecutor::new(Arc::new(driver)).with_wait_timeout(TEST_WAIT)
}

// ---------------------------------------------------------------------------
// Agent backed by the simulated editor
// ---------------------------------------------------------------------------

fn error_message(err: DriverError) -> String {
    match err {
        DriverError::ElementNotFound(_) => "element not found".to_string(),
        DriverError::Ambiguous { count, .. } => {
            format!("strict mode violation: resolved to {count} elements")
        }
        DriverError::Timeout => "Timeout exceeded while waiting for selector".to_string(),
        other => other.to_string(),
    }
}

async fn serve(sim: &SimDriver, request: Request) -> Response {
    let result: Result<Response, DriverError> = async {
        let loc = |s: &str| Locator::parse(s).map_err(DriverError::from);
        match request {
            Request::Heartbeat => Ok(Response::Ok),
            Request::OpenPage { title } => sim.open_page(&title).await.map(|_| Response::Ok),
            Request::TypeText {
                selector,
                text,
                delay_ms,
            } => sim
                .type_text(
                    &loc(&selector)?,
                    &text,
                    delay_ms.map(|ms| Duration::from_millis(ms.into())),
                )
                .await
                .map(|_| Response::Ok),
            Request::PressKey { selector, key } => {
                sim.press_key(&loc(&selector)?, &key).await.map(|_| Response::Ok)
            }
            Request::KeyboardPress { chord } => sim.keyboard_press(&chord).await.map(|_| Response::Ok),
            Request::Click { selector } => sim.click(&loc(&selector)?).await.map(|_| Response::Ok),
            Request::WaitForSelector {
                selector,
                timeout_ms,
            } => {
                let element = sim
                    .wait_for_visible(&loc(&selector)?, Duration::from_millis(timeout_ms.into()))
                    .await?;
                Ok(Response::Tree {
                    json: serde_json::to_string(&element).unwrap(),
                })
            }
            Request::InputValue { selector } => sim
                .input_value(&loc(&selector)?)
                .await
                .map(|value| Response::Value { value }),
            Request::DumpTree => {
                let tree = sim.dump_tree().await?;
                Ok(Response::Tree {
                    json: serde_json::to_string(&tree).unwrap(),
                })
            }
            Request::Count { selector } => sim
                .count(&loc(&selector)?)
                .await
                .map(|count| Response::Count { count: count as u32 }),
        }
    }
    .await;

    result.unwrap_or_else(|e| Response::Error {
        message: error_message(e),
    })
}

/// Start an agent that executes every request against a [`SimDriver`],
/// the way the in-browser agent drives the real application. Accepts any
/// number of sequential connections sharing one editor.
pub async fn sim_agent(options: SimOptions) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut sim = SimDriver::with_options(options);
    sim.connect().await.unwrap();
    let sim = Arc::new(sim);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            while let Some(request) = read_request(&mut stream).await {
                let response = serve(&sim, request).await;
                write_response(&mut stream, &response).await;
            }
        }
    });

    addr
}

/// A runner whose AgentDriver talks to a fresh [`sim_agent`].
pub async fn sim_agent_runner(options: SimOptions) -> ScenarioRunner {
    let addr = sim_agent(options).await;
    let mut driver = AgentDriver::new(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    ScenarioRunner::new(StepExecutor::new(Arc::new(driver)).with_wait_timeout(TEST_WAIT))
}

/// A runner over an in-process [`SimDriver`].
pub async fn sim_runner(options: SimOptions) -> ScenarioRunner {
    let mut driver = SimDriver::with_options(options);
    driver.connect().await.unwrap();
    ScenarioRunner::new(StepExecutor::new(Arc::new(driver)).with_wait_timeout(TEST_WAIT))
}
