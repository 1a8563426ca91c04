//! Scenario execution and run reports.
//!
//! [`ScenarioRunner`] executes a scenario's steps strictly in order through a
//! [`StepExecutor`] and stops at the first failure. Disabled scenarios are
//! reported as skipped without touching the driver.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::executor::StepExecutor;
use crate::scenario::{Scenario, ScenarioError, ScenarioStatus};
use crate::step::{StepLog, StepOutcome};

/// How a scenario run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

/// The record of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Scenario name.
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub steps: Vec<StepLog>,
    /// The failure behind [`RunOutcome::Failed`]; not persisted.
    #[serde(skip)]
    pub failure: Option<Arc<ScenarioError>>,
}

impl RunReport {
    fn new(scenario: &Scenario, outcome: RunOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.name.clone(),
            started_at: Utc::now(),
            duration_ms: 0,
            outcome,
            steps: Vec::new(),
            failure: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == RunOutcome::Passed
    }

    pub fn failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    pub fn skipped(&self) -> bool {
        matches!(self.outcome, RunOutcome::Skipped { .. })
    }

    pub fn error(&self) -> Option<&ScenarioError> {
        self.failure.as_deref()
    }
}

/// Reports of one run set, in execution order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub reports: Vec<RunReport>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.skipped()).count()
    }

    /// `true` when no scenario failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs scenarios against one driver.
pub struct ScenarioRunner {
    executor: StepExecutor,
}

impl ScenarioRunner {
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Runs one scenario to completion or first failure.
    pub async fn run(&self, scenario: &Scenario) -> RunReport {
        if let ScenarioStatus::Disabled { reason } = &scenario.status {
            info!(scenario = %scenario.name, %reason, "scenario skipped");
            return RunReport::new(
                scenario,
                RunOutcome::Skipped {
                    reason: reason.clone(),
                },
            );
        }

        let span = info_span!("run_scenario", scenario = %scenario.name);
        async {
            let mut report = RunReport::new(scenario, RunOutcome::Passed);
            let start = Instant::now();

            for (index, step) in scenario.all_steps().enumerate() {
                let step_start = Instant::now();
                let result = self.executor.execute(index + 1, &step).await;
                let duration_ms = step_start.elapsed().as_millis() as u64;
                match result {
                    Ok(()) => {
                        report
                            .steps
                            .push(StepLog::new(index, step, StepOutcome::Success, duration_ms));
                    }
                    Err(e) => {
                        warn!(error = %e, "scenario failed");
                        report.steps.push(StepLog::new(
                            index,
                            step,
                            StepOutcome::Failure(e.to_string()),
                            duration_ms,
                        ));
                        report.outcome = RunOutcome::Failed {
                            error: e.to_string(),
                        };
                        report.failure = Some(Arc::new(e));
                        break;
                    }
                }
            }

            report.duration_ms = start.elapsed().as_millis() as u64;
            info!(passed = report.passed(), duration_ms = report.duration_ms, "scenario finished");
            report
        }
        .instrument(span)
        .await
    }

    /// Runs a run set sequentially.
    pub async fn run_all<'a>(&self, scenarios: impl IntoIterator<Item = &'a Scenario>) -> RunSummary {
        let mut summary = RunSummary::default();
        for scenario in scenarios {
            summary.reports.push(self.run(scenario).await);
        }
        summary
    }
}
