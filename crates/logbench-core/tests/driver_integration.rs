//! Step execution through AgentDriver against a canned-response mock agent.
//!
//! Each test checks both the requests that reach the wire and how agent
//! answers map onto scenario failures.

mod common;

use common::{connected_executor, TEST_WAIT};

use logbench_core::executor::{PAGE_TITLE_LEN, FIRST_EDITOR};
use logbench_core::protocol::{Request, Response};
use logbench_core::scenario::ScenarioError;
use logbench_core::step::{Assertion, Step};

fn editor_tree() -> Response {
    Response::Tree {
        json: r#"{"tag":"textarea","value":""}"#.to_string(),
    }
}

#[tokio::test]
async fn test_create_random_page_opens_and_waits() {
    let (executor, mut requests) =
        connected_executor(vec![Response::Ok, Response::Ok, editor_tree()]).await;

    executor.execute(1, &Step::CreateRandomPage).await.unwrap();

    assert_eq!(requests.recv().await, Some(Request::Heartbeat));
    match requests.recv().await {
        Some(Request::OpenPage { title }) => assert_eq!(title.len(), PAGE_TITLE_LEN),
        other => panic!("expected OpenPage, got {other:?}"),
    }
    assert_eq!(
        requests.recv().await,
        Some(Request::WaitForSelector {
            selector: FIRST_EDITOR.to_string(),
            timeout_ms: TEST_WAIT.as_millis() as u32,
        })
    );
}

#[tokio::test]
async fn test_enter_next_block_counts_presses_and_waits() {
    let (executor, mut requests) = connected_executor(vec![
        Response::Ok,
        Response::Count { count: 1 },
        Response::Ok,
        editor_tree(),
    ])
    .await;

    executor.execute(3, &Step::EnterNextBlock).await.unwrap();

    let _heartbeat = requests.recv().await;
    assert_eq!(
        requests.recv().await,
        Some(Request::Count {
            selector: ".ls-block".to_string()
        })
    );
    assert_eq!(
        requests.recv().await,
        Some(Request::PressKey {
            selector: FIRST_EDITOR.to_string(),
            key: "Enter".to_string(),
        })
    );
    assert!(matches!(
        requests.recv().await,
        Some(Request::WaitForSelector { ref selector, .. }) if selector == ".ls-block >> nth=1 >> textarea"
    ));
}

#[tokio::test]
async fn test_type_text_forwards_delay() {
    let (executor, mut requests) = connected_executor(vec![Response::Ok, Response::Ok]).await;

    let step = Step::TypeText {
        locator: FIRST_EDITOR.parse().unwrap(),
        text: "bar [[blah]]".to_string(),
        delay_ms: Some(100),
    };
    executor.execute(4, &step).await.unwrap();

    let _heartbeat = requests.recv().await;
    assert_eq!(
        requests.recv().await,
        Some(Request::TypeText {
            selector: FIRST_EDITOR.to_string(),
            text: "bar [[blah]]".to_string(),
            delay_ms: Some(100),
        })
    );
}

#[tokio::test]
async fn test_oracle_mismatch_via_agent() {
    let (executor, _requests) = connected_executor(vec![
        Response::Ok,
        Response::Value {
            value: Some("#foo bar [[blah]]]".to_string()),
        },
    ])
    .await;

    let oracle = Step::Expect(Assertion::InputValue {
        locator: FIRST_EDITOR.parse().unwrap(),
        expected: "#foo bar [[blah]]".to_string(),
    });
    let err = executor.execute(24, &oracle).await.unwrap_err();

    match err {
        ScenarioError::AssertionMismatch { step, actual, .. } => {
            assert_eq!(step, 24);
            assert_eq!(actual, "\"#foo bar [[blah]]]\"");
        }
        other => panic!("expected AssertionMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_count_assertion_via_agent() {
    let (executor, _requests) =
        connected_executor(vec![Response::Ok, Response::Count { count: 1 }]).await;

    let step = Step::Expect(Assertion::Count {
        locator: r#".block-ref >> text="Some random text""#.parse().unwrap(),
        expected: 1,
    });
    executor.execute(7, &step).await.unwrap();
}

#[tokio::test]
async fn test_agent_not_found_is_locator_not_found() {
    let (executor, _requests) = connected_executor(vec![
        Response::Ok,
        Response::Error {
            message: "element not found".to_string(),
        },
    ])
    .await;

    let err = executor
        .execute(
            11,
            &Step::Click {
                locator: ".absolute >> text=foo".parse().unwrap(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::LocatorNotFound { step: 11, ref locator } if locator == ".absolute >> text=foo"
    ));
}

#[tokio::test]
async fn test_agent_strict_mode_violation_is_ambiguous() {
    let (executor, _requests) = connected_executor(vec![
        Response::Ok,
        Response::Error {
            message: "strict mode violation: resolved to 2 elements".to_string(),
        },
    ])
    .await;

    let step = Step::Press {
        locator: "textarea".parse().unwrap(),
        key: "ArrowLeft".to_string(),
    };
    let err = executor.execute(5, &step).await.unwrap_err();

    assert!(matches!(err, ScenarioError::Ambiguous { step: 5, count: 2, .. }));
}

#[tokio::test]
async fn test_agent_wait_timeout_is_wait_timeout() {
    let (executor, _requests) = connected_executor(vec![
        Response::Ok,
        Response::Error {
            message: "Timeout 200ms exceeded".to_string(),
        },
    ])
    .await;

    let step = Step::WaitForVisible {
        locator: r#"text="Search for a page""#.parse().unwrap(),
        timeout_ms: Some(200),
    };
    let err = executor.execute(17, &step).await.unwrap_err();

    assert!(matches!(
        err,
        ScenarioError::WaitTimeout { step: 17, timeout_ms: 200, .. }
    ));
}

#[tokio::test]
async fn test_comment_ignores_driver() {
    // Only the heartbeat is answered; a comment must not send anything.
    let (executor, mut requests) = connected_executor(vec![Response::Ok]).await;

    executor
        .execute(1, &Step::Comment("pause for inspection".to_string()))
        .await
        .unwrap();

    assert_eq!(requests.recv().await, Some(Request::Heartbeat));
    assert!(requests.try_recv().is_err());
}
