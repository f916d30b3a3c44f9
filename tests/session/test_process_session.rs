//! Integration tests for `ProcessSession`
//!
//! Drives a session against an in-memory fake engine: initialization and
//! resume, request correlation, timeouts, turn tracking and process exit.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    CANONICAL_A, CANONICAL_B, Engines, MockLauncher, channel_sink, count_turn_ends, drain_events,
    init_logging, quick_options, wait_for_event,
};
use kodegen_droid_agent::{
    AutonomyLevel, DiagnosticsSink, Direction, DroidError, InboundRequestKind, InitSource,
    MemoryDiagnostics, ProcessSession, RequestId, SessionEvent, SessionId, SessionPhase,
    SessionSettings,
};
use serde_json::json;
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(5);

fn low_autonomy() -> SessionSettings {
    SessionSettings::builder()
        .model_id("test-model")
        .autonomy_level(AutonomyLevel::Low)
        .build()
}

fn new_session(
    timeout: Duration,
) -> (
    ProcessSession,
    Arc<MockLauncher>,
    Engines,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    init_logging();
    let (launcher, engines) = MockLauncher::new();
    let (sink, events) = channel_sink();
    let session = ProcessSession::new(launcher.clone(), quick_options(timeout), sink);
    (session, launcher, engines, events)
}

/// Session initialized as `CANONICAL_A`, plus its engine
async fn ready_session(
    timeout: Duration,
) -> (
    ProcessSession,
    common::FakeEngine,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let (session, _launcher, mut engines, events) = new_session(timeout);
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };
    let mut engine = engines.next().await;
    engine.accept_initialize(CANONICAL_A).await;
    init.await.unwrap().unwrap();
    (session, engine, events)
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let (session, launcher, mut engines, _events) = new_session(TIMEOUT);
    assert_eq!(session.phase(), SessionPhase::Unstarted);

    session.start().unwrap();
    session.start().unwrap();

    assert_eq!(launcher.launches(), 1);
    assert_eq!(session.phase(), SessionPhase::Starting);
    assert!(session.pid().is_some());
    let _engine = engines.next().await;
    assert!(engines.try_next().is_none());
}

#[tokio::test]
async fn test_initialize_sends_identity_and_settings() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };

    let mut engine = engines.next().await;
    let params = engine.accept_initialize(CANONICAL_A).await;
    assert_eq!(params["machineId"], "test-machine");
    assert_eq!(params["modelId"], "test-model");
    assert_eq!(params["autonomyLevel"], "auto-low");
    assert!(params["cwd"].is_string());

    let outcome = init.await.unwrap().unwrap();
    assert_eq!(outcome.session_id.as_str(), CANONICAL_A);
    assert_eq!(outcome.source, InitSource::Init);
    assert_eq!(
        session.phase(),
        SessionPhase::Idle {
            session_id: SessionId::from(CANONICAL_A)
        }
    );
    assert_eq!(session.autonomy_level(), Some(AutonomyLevel::Low));
}

#[tokio::test]
async fn test_initialized_session_resumes_in_place() {
    let (session, mut engine, _events) = ready_session(TIMEOUT).await;

    let resume = SessionId::from(CANONICAL_B);
    let outcome = session
        .ensure_initialized(&low_autonomy(), Some(&resume))
        .await
        .unwrap();

    assert_eq!(outcome.source, InitSource::ResumeInPlace);
    assert_eq!(outcome.session_id.as_str(), CANONICAL_A);
    engine.expect_silence(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_malformed_resume_id_skips_load_session() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move {
            let prior = SessionId::from("draft-42");
            session.ensure_initialized(&low_autonomy(), Some(&prior)).await
        })
    };

    let mut engine = engines.next().await;
    engine.accept_initialize(CANONICAL_A).await;
    let outcome = init.await.unwrap().unwrap();

    assert_eq!(outcome.source, InitSource::ResumeInvalid);
    assert_eq!(outcome.session_id.as_str(), CANONICAL_A);
    engine.expect_silence(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_resume_loads_prior_session() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move {
            let prior = SessionId::from(CANONICAL_B);
            session.ensure_initialized(&low_autonomy(), Some(&prior)).await
        })
    };

    let mut engine = engines.next().await;
    engine.accept_initialize(CANONICAL_A).await;
    let load = engine.ack("droid.load_session").await;
    assert_eq!(load.params, json!({ "sessionId": CANONICAL_B }));

    let outcome = init.await.unwrap().unwrap();
    assert_eq!(outcome.source, InitSource::Resume);
    assert_eq!(outcome.session_id.as_str(), CANONICAL_B);
    assert_eq!(session.session_id(), Some(SessionId::from(CANONICAL_B)));
}

#[tokio::test]
async fn test_failed_resume_keeps_fresh_session() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move {
            let prior = SessionId::from(CANONICAL_B);
            session.ensure_initialized(&low_autonomy(), Some(&prior)).await
        })
    };

    let mut engine = engines.next().await;
    engine.accept_initialize(CANONICAL_A).await;
    let load = engine.expect_request("droid.load_session").await;
    engine
        .respond_error(Some(&load.id), -32000, "session not found")
        .await;

    let outcome = init.await.unwrap().unwrap();
    assert_eq!(outcome.source, InitSource::ResumeFailed);
    assert_eq!(outcome.session_id.as_str(), CANONICAL_A);
    assert!(session.is_initialized());
}

#[tokio::test]
async fn test_initialize_without_session_id_fails() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };

    let mut engine = engines.next().await;
    let request = engine.expect_request("droid.initialize_session").await;
    engine.respond(&request.id, json!({ "ok": true })).await;

    let err = init.await.unwrap().unwrap_err();
    assert!(matches!(err, DroidError::MissingSessionId), "{err:?}");
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_initialize_rpc_error_fails() {
    let (session, _launcher, mut engines, _events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };

    let mut engine = engines.next().await;
    let request = engine.expect_request("droid.initialize_session").await;
    engine
        .respond_error(Some(&request.id), 401, "invalid api key")
        .await;

    match init.await.unwrap() {
        Err(DroidError::Rpc { method, code, message, .. }) => {
            assert_eq!(method, "droid.initialize_session");
            assert_eq!(code, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_launch_failure_is_returned() {
    let (session, launcher, _engines, _events) = new_session(TIMEOUT);
    launcher.fail_launches();

    let err = session
        .ensure_initialized(&low_autonomy(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DroidError::Spawn(_)), "{err:?}");
    assert_eq!(session.phase(), SessionPhase::Unstarted);
}

#[tokio::test]
async fn test_concurrent_requests_resolve_out_of_order() {
    let (session, mut engine, _events) = ready_session(TIMEOUT).await;

    let mut calls = Vec::new();
    for model in ["model-a", "model-b", "model-c"] {
        let session = session.clone();
        calls.push((
            model,
            tokio::spawn(async move {
                let patch = SessionSettings::builder().model_id(model).build();
                session.update_settings(&patch).await
            }),
        ));
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(engine.expect_request("droid.update_session_settings").await);
    }
    assert_eq!(session.pending_requests(), 3);

    // Answer in reverse; only model-b fails.
    for request in received.iter().rev() {
        if request.params["modelId"] == "model-b" {
            engine
                .respond_error(Some(&request.id), 400, "unknown model")
                .await;
        } else {
            engine.respond(&request.id, json!({})).await;
        }
    }

    for (model, call) in calls {
        let result = call.await.unwrap();
        if model == "model-b" {
            assert!(result.unwrap_err().is_rpc());
        } else {
            assert!(result.is_ok(), "{model}: {result:?}");
        }
    }
    assert_eq!(session.pending_requests(), 0);
}

#[tokio::test]
async fn test_null_id_response_settles_oldest_request() {
    let (session, mut engine, _events) = ready_session(TIMEOUT).await;

    let first = {
        let session = session.clone();
        tokio::spawn(async move {
            let patch = SessionSettings::builder().model_id("first").build();
            session.update_settings(&patch).await
        })
    };
    let first_request = engine.expect_request("droid.update_session_settings").await;

    let second = {
        let session = session.clone();
        tokio::spawn(async move {
            let patch = SessionSettings::builder().model_id("second").build();
            session.update_settings(&patch).await
        })
    };
    let second_request = engine.expect_request("droid.update_session_settings").await;
    assert_eq!(first_request.params["modelId"], "first");

    engine.respond_error(None, -32603, "internal error").await;
    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, DroidError::Rpc { code: -32603, .. }), "{err:?}");
    assert_eq!(session.pending_requests(), 1);

    engine.respond(&second_request.id, json!({})).await;
    second.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_request_times_out_once() {
    let (session, mut engine, _events) = ready_session(Duration::from_millis(150)).await;

    let patch = SessionSettings::builder().model_id("slow").build();
    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.update_settings(&patch).await })
    };
    let request = engine.expect_request("droid.update_session_settings").await;

    let err = call.await.unwrap().unwrap_err();
    match err {
        DroidError::Timeout { method, after } => {
            assert_eq!(method, "droid.update_session_settings");
            assert_eq!(after, Duration::from_millis(150));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(session.pending_requests(), 0);

    // A late response finds nothing to settle.
    engine.respond(&request.id, json!({})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.pending_requests(), 0);
    assert!(session.is_initialized());
}

#[tokio::test]
async fn test_timeout_does_not_end_turn() {
    let (session, mut engine, mut events) = ready_session(Duration::from_millis(100)).await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("run the tests", None).await })
    };
    engine.expect_request("droid.add_user_message").await;
    assert!(call.await.unwrap().unwrap_err().to_string().contains("timed out"));

    assert!(session.is_turn_active());
    let events = drain_events(&mut events).await;
    assert_eq!(count_turn_ends(&events), 0);
}

#[tokio::test]
async fn test_user_message_turn_lifecycle() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("hello", Some("msg-1")).await })
    };
    let request = engine.ack("droid.add_user_message").await;
    assert_eq!(request.params, json!({ "text": "hello", "messageId": "msg-1" }));
    call.await.unwrap().unwrap();
    assert!(session.is_turn_active());

    engine.working_state("streaming_assistant_message").await;
    engine
        .notify(json!({ "type": "assistant_text_delta", "messageId": "m1", "textDelta": "Hi" }))
        .await;
    engine.working_state("idle").await;
    engine.working_state("idle").await;

    let (_, before) = wait_for_event(&mut events, common::is_turn_ended).await;
    let rest = drain_events(&mut events).await;

    let started = before
        .iter()
        .filter(|e| matches!(e, SessionEvent::TurnStarted))
        .count();
    assert_eq!(started, 1);
    assert_eq!(count_turn_ends(&rest), 0);
    assert!(
        before
            .iter()
            .any(|e| e.assistant_text().as_deref() == Some("Hi"))
    );
    assert!(!session.is_turn_active());
}

#[tokio::test]
async fn test_turn_ended_event_carries_success_code() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("hello", None).await })
    };
    engine.ack("droid.add_user_message").await;
    call.await.unwrap().unwrap();
    engine.working_state("idle").await;

    let (ended, _) = wait_for_event(&mut events, common::is_turn_ended).await;
    assert_eq!(ended, SessionEvent::TurnEnded { code: 0 });
}

#[tokio::test]
async fn test_error_notification_ends_turn_once() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("hello", None).await })
    };
    engine.ack("droid.add_user_message").await;
    call.await.unwrap().unwrap();

    engine.working_state("executing_tool").await;
    engine
        .notify(json!({ "type": "error", "message": "rate limited" }))
        .await;
    engine.working_state("idle").await;

    let (ended, before) = wait_for_event(&mut events, common::is_turn_ended).await;
    assert_eq!(ended, SessionEvent::TurnEnded { code: 1 });
    assert_eq!(
        before.last(),
        Some(&SessionEvent::Error {
            message: "rate limited".to_string()
        })
    );
    let rest = drain_events(&mut events).await;
    assert_eq!(count_turn_ends(&rest), 0);
}

#[tokio::test]
async fn test_engine_initiated_turn_starts_on_busy_state() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    engine.working_state("streaming_assistant_message").await;
    let (started, _) =
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::TurnStarted)).await;
    assert_eq!(started, SessionEvent::TurnStarted);
    assert!(session.is_turn_active());
}

#[tokio::test]
async fn test_process_exit_rejects_pending_and_ends_turn() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    let message = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("hello", None).await })
    };
    engine.expect_request("droid.add_user_message").await;
    let settings = {
        let session = session.clone();
        tokio::spawn(async move {
            let patch = SessionSettings::builder().model_id("other").build();
            session.update_settings(&patch).await
        })
    };
    engine.expect_request("droid.update_session_settings").await;
    assert_eq!(session.pending_requests(), 2);

    engine.exit(Some(3));

    for call in [message, settings] {
        let err = call.await.unwrap().unwrap_err();
        assert!(
            matches!(err, DroidError::ProcessExited { code: Some(3) }),
            "{err:?}"
        );
    }

    let (ended, before) = wait_for_event(&mut events, common::is_turn_ended).await;
    assert_eq!(ended, SessionEvent::TurnEnded { code: 3 });
    assert!(before.contains(&SessionEvent::ProcessExited { code: Some(3) }));
    let rest = drain_events(&mut events).await;
    assert_eq!(count_turn_ends(&rest), 0);

    assert_eq!(session.pending_requests(), 0);
    assert_eq!(
        session.phase(),
        SessionPhase::Terminated { exit_code: Some(3) }
    );
    assert!(session.session_id().is_none());
}

#[tokio::test]
async fn test_exit_flushes_unterminated_output() {
    let (_session, mut engine, mut events) = ready_session(TIMEOUT).await;

    engine.send_raw(b"Update available: 1.2.3\npartial tail").await;
    engine.exit(Some(0));

    let (_, before) = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::ProcessExited { .. })
    })
    .await;
    let output: Vec<_> = before
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ProcessOutput(line) => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(output, ["Update available: 1.2.3", "partial tail"]);
}

#[tokio::test]
async fn test_stderr_is_forwarded() {
    let (_session, mut engine, mut events) = ready_session(TIMEOUT).await;

    engine.write_stderr("warning: low disk space").await;

    let (event, _) =
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::Stderr(_))).await;
    assert_eq!(
        event,
        SessionEvent::Stderr("warning: low disk space".to_string())
    );
}

#[tokio::test]
async fn test_inbound_request_round_trip() {
    let (session, mut engine, mut events) = ready_session(TIMEOUT).await;

    engine
        .send_request(
            "perm-7",
            "droid.request_permission",
            json!({ "toolUse": { "name": "Execute", "command": "rm -rf build" } }),
        )
        .await;

    let (event, _) =
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::InboundRequest(_))).await;
    let SessionEvent::InboundRequest(request) = event else {
        unreachable!();
    };
    assert_eq!(request.id, RequestId::from("perm-7"));
    assert_eq!(request.kind, InboundRequestKind::Permission);
    assert_eq!(request.params["toolUse"]["name"], "Execute");

    session
        .respond_to(&request.id, json!({ "selectedOption": "proceed_once" }))
        .unwrap();

    let response = engine.next_message().await;
    assert_eq!(response["type"], "response");
    assert_eq!(response["id"], "perm-7");
    assert_eq!(response["result"], json!({ "selectedOption": "proceed_once" }));
    assert_eq!(response["jsonrpc"], "2.0");
}

#[tokio::test]
async fn test_unknown_notifications_pass_through() {
    let (_session, mut engine, mut events) = ready_session(TIMEOUT).await;

    let payload = json!({ "type": "brand_new_feature", "detail": [1, 2, 3] });
    engine.notify(payload.clone()).await;

    let (event, _) =
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::Notification { .. })).await;
    assert_eq!(
        event,
        SessionEvent::Notification {
            method: "droid.session_notification".to_string(),
            params: json!({ "notification": payload }),
        }
    );
}

#[tokio::test]
async fn test_add_user_message_requires_initialization() {
    let (session, launcher, _engines, _events) = new_session(TIMEOUT);

    let err = session.add_user_message("hello", None).await.unwrap_err();
    assert!(matches!(err, DroidError::NotInitialized), "{err:?}");
    assert_eq!(launcher.launches(), 0);
    assert!(!session.is_turn_active());
}

#[tokio::test]
async fn test_interrupt_swallows_errors() {
    let (session, mut engine, _events) = ready_session(TIMEOUT).await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.interrupt().await })
    };
    let request = engine.expect_request("droid.interrupt_session").await;
    assert_eq!(request.params, json!({}));
    engine
        .respond_error(Some(&request.id), 409, "nothing to interrupt")
        .await;
    call.await.unwrap();

    // No process at all: nothing is sent and nothing fails.
    let (idle, _launcher, _engines, _events) = new_session(TIMEOUT);
    idle.interrupt().await;
}

#[tokio::test]
async fn test_dispose_mid_request_then_restart() {
    let (session, launcher, mut engines, mut events) = new_session(TIMEOUT);
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };
    let mut engine = engines.next().await;
    engine.expect_request("droid.initialize_session").await;

    session.dispose();
    assert_eq!(session.phase(), SessionPhase::Unstarted);
    engine.wait_killed().await;

    let err = init.await.unwrap().unwrap_err();
    assert!(matches!(err, DroidError::ProcessExited { .. }), "{err:?}");
    let (_, _) = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::ProcessExited { .. })
    })
    .await;

    // The same session can launch a fresh process.
    let init = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };
    let mut engine = engines.next().await;
    let request = engine.expect_request("droid.initialize_session").await;
    assert_eq!(request.id, "req-2", "request ids keep counting across launches");
    engine
        .respond(&request.id, json!({ "sessionId": CANONICAL_B }))
        .await;
    assert_eq!(init.await.unwrap().unwrap().session_id.as_str(), CANONICAL_B);
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn test_close_is_terminal() {
    let (session, launcher, mut engines, _events) = new_session(TIMEOUT);
    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };
    let mut engine = engines.next().await;
    engine.expect_request("droid.initialize_session").await;

    // Queued behind the first initialize.
    let second = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_initialized(&low_autonomy(), None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.close();
    assert!(session.is_closed());
    engine.wait_killed().await;

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, DroidError::ProcessExited { .. }), "{err:?}");
    let err = second.await.unwrap().unwrap_err();
    assert!(matches!(err, DroidError::SessionClosed), "{err:?}");
    assert!(matches!(session.start(), Err(DroidError::SessionClosed)));

    assert_eq!(launcher.launches(), 1);
    assert!(engines.try_next().is_none());
    assert_eq!(session.phase(), SessionPhase::Unstarted);
}

#[tokio::test]
async fn test_diagnostics_record_redacted_traffic() {
    init_logging();
    let (launcher, mut engines) = MockLauncher::new();
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let session = ProcessSession::builder(launcher)
        .options(quick_options(TIMEOUT))
        .diagnostics(Some(diagnostics.clone() as Arc<dyn DiagnosticsSink>))
        .build();

    let init = {
        let session = session.clone();
        tokio::spawn(async move {
            let settings = SessionSettings::builder()
                .extra("apiKey", json!("fk-secret"))
                .build();
            session.ensure_initialized(&settings, None).await
        })
    };
    let mut engine = engines.next().await;
    let params = engine.accept_initialize(CANONICAL_A).await;
    assert_eq!(params["apiKey"], "fk-secret");
    init.await.unwrap().unwrap();

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.add_user_message("my password is hunter2", None).await })
    };
    engine.ack("droid.add_user_message").await;
    call.await.unwrap().unwrap();

    let records = diagnostics.records();
    let init_record = records
        .iter()
        .find(|r| r.method.as_deref() == Some("droid.initialize_session"))
        .unwrap();
    assert_eq!(init_record.direction, Direction::OutboundRequest);
    assert_eq!(init_record.payload["params"]["apiKey"], "[redacted]");

    let message_record = records
        .iter()
        .find(|r| r.method.as_deref() == Some("droid.add_user_message"))
        .unwrap();
    assert_eq!(message_record.payload["params"]["text"], "[redacted 22 chars]");

    assert!(
        records
            .iter()
            .any(|r| r.direction == Direction::InboundResponse)
    );
}
