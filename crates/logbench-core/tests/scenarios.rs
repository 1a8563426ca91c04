//! Catalog scenarios against the in-process simulated editor.

mod common;

use common::sim_runner;

use logbench_core::catalog::{
    self, copy_paste_block_ref, hashtag_and_brackets_same_line,
    hashtag_and_brackets_same_line_with_offset,
};
use logbench_core::driver::AutomationDriver;
use logbench_core::platform::Platform;
use logbench_core::runner::RunOutcome;
use logbench_core::scenario::ScenarioError;
use logbench_core::sim::SimOptions;
use logbench_core::step::Step;

#[tokio::test]
async fn hashtag_and_brackets_passes() {
    let runner = sim_runner(SimOptions::default()).await;
    let scenario = hashtag_and_brackets_same_line().unwrap();

    let report = runner.run(&scenario).await;

    assert!(report.passed(), "scenario failed: {:?}", report.outcome);
    assert_eq!(report.steps.len(), scenario.steps.len() + 1);
    let value = runner
        .executor()
        .driver()
        .input_value(&"textarea >> nth=0".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("#foo bar [[blah]]"));
}

#[tokio::test]
async fn search_prompt_is_visible_before_typing_query() {
    let runner = sim_runner(SimOptions::default()).await;
    let report = runner.run(&hashtag_and_brackets_same_line().unwrap()).await;
    assert!(report.passed());

    let wait = report
        .steps
        .iter()
        .position(|log| matches!(log.step, Step::WaitForVisible { .. }))
        .unwrap();
    assert!(matches!(
        &report.steps[wait + 1].step,
        Step::TypeText { text, .. } if text == "fo"
    ));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let runner = sim_runner(SimOptions::default()).await;
    let scenario = hashtag_and_brackets_same_line().unwrap();

    let first = runner.run(&scenario).await;
    let second = runner.run(&scenario).await;

    assert!(first.passed(), "{:?}", first.outcome);
    assert!(second.passed(), "{:?}", second.outcome);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn shifted_caret_offset_fails_the_oracle() {
    let runner = sim_runner(SimOptions::default()).await;
    let scenario = hashtag_and_brackets_same_line_with_offset(11).unwrap();

    let report = runner.run(&scenario).await;

    assert!(report.failed());
    match report.error() {
        Some(ScenarioError::AssertionMismatch {
            step,
            expected,
            actual,
        }) => {
            assert_eq!(*step, scenario.steps.len() + 1);
            assert_eq!(expected, "\"#foo bar [[blah]]\"");
            assert_eq!(actual, "\"b#foo ar [[blah]]\"");
        }
        other => panic!("expected AssertionMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_search_prompt_times_out() {
    let runner = sim_runner(SimOptions {
        page_search_popup: false,
    })
    .await;
    let scenario = hashtag_and_brackets_same_line().unwrap();

    let report = runner.run(&scenario).await;

    match report.error() {
        Some(ScenarioError::WaitTimeout { locator, .. }) => {
            assert_eq!(locator, r#"text="Search for a page""#);
        }
        other => panic!("expected WaitTimeout, got {other:?}"),
    }
    // Nothing after the wait ran.
    assert!(matches!(
        report.steps.last().map(|log| &log.step),
        Some(Step::WaitForVisible { .. })
    ));
}

#[tokio::test]
async fn disabled_clipboard_scenario_never_runs() {
    let runner = sim_runner(SimOptions::default()).await;

    for platform in [Platform::Mac, Platform::Other] {
        let report = runner.run(&copy_paste_block_ref(platform).unwrap()).await;
        assert!(matches!(report.outcome, RunOutcome::Skipped { .. }));
        assert!(report.steps.is_empty());
        assert!(!report.passed());
    }

    // The editor was never touched.
    let tree = runner.executor().driver().dump_tree().await.unwrap();
    assert!(tree[0].children.is_empty());
}

#[tokio::test]
async fn full_catalog_summary() {
    let runner = sim_runner(SimOptions::default()).await;
    let scenarios = catalog::all().unwrap();

    let summary = runner.run_all(&scenarios).await;

    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.failed(), 0);
    assert!(summary.is_success());
}
