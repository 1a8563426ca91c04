//! # logbench-core
//!
//! Core library for end-to-end editing checks of a notes application.
//!
//! This crate drives a running instance of the application through a
//! UI-automation surface, replays scripted editing scenarios against it and
//! checks their oracle. It also models the application's mobile packaging
//! descriptor.
//!
//! ## Modules
//!
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) capability trait
//! - [`agent_driver`] / [`agent_client`] / [`protocol`] - Driver backed by the in-browser agent over TCP
//! - [`sim`] - In-process simulated editor backend
//! - [`locator`] / [`element`] - Locator strings and the element tree they resolve against
//! - [`step`] / [`scenario`] / [`catalog`] - Steps, scenarios and the concrete scenarios
//! - [`executor`] / [`runner`] - Step execution and scenario runs
//! - [`report`] - JSON Lines persistence of run reports
//! - [`descriptor`] - The packaging descriptor
//! - [`config`] / [`platform`] - Harness configuration and host platform
//!
//! ## Example
//!
//! ```no_run
//! use logbench_core::catalog;
//! use logbench_core::driver::DriverConfig;
//! use logbench_core::executor::StepExecutor;
//! use logbench_core::runner::ScenarioRunner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = StepExecutor::from_config_connected(DriverConfig::Simulated).await?;
//! let runner = ScenarioRunner::new(executor);
//!
//! let scenarios = catalog::all()?;
//! let summary = runner.run_all(&scenarios).await;
//! println!("{} passed, {} failed", summary.passed(), summary.failed());
//! # Ok(())
//! # }
//! ```

pub mod agent_client;
pub mod agent_driver;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod element;
pub mod executor;
pub mod locator;
pub mod platform;
pub mod protocol;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod sim;
pub mod step;
