//! End-to-end session scenarios against the scripted in-memory kernel.

use std::time::Duration;

use nbdebug_dap::testing::FakeKernel;
use nbdebug_dap::{
    Command, ContinueOutcome, DapError, DebugSession, Event, Reply, SessionEvent, SessionOptions,
    SessionState, DEFAULT_THREAD_ID,
};
use serde_json::json;
use tokio::sync::broadcast;

const CELL: &str = "x = 1\nitems = [1, 2]\nprint(x)\ny = x + 1\nprint(y)\nz = 3\nprint(z)\n";

fn new_session() -> (DebugSession, FakeKernel) {
    let (connection, kernel) = FakeKernel::spawn();
    let mut session = DebugSession::new(connection, SessionOptions::default());
    session.set_source(CELL);
    (session, kernel)
}

/// Collect bus events until `pred` matches or a second passes.
async fn wait_for_event(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Option<SessionEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) if pred(&event) => return Some(event),
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn scenario_start_sends_handshake_in_order() {
    let (mut session, kernel) = new_session();
    session.toggle_breakpoint(7, "print(z)");
    session.toggle_breakpoint(3, "print(x)");

    session.start().await.unwrap();
    assert!(kernel.wait_for_requests(6).await);

    let requests = kernel.requests();
    let seqs: Vec<i64> = requests.iter().map(|req| req.seq).collect();
    assert_eq!(seqs, vec![0, 2, 4, 6, 8, 10]);
    assert_eq!(
        kernel.commands(),
        vec![
            "initialize",
            "attach",
            "updateCell",
            "setBreakpoints",
            "configurationDone",
            "execute"
        ]
    );

    let sync = serde_json::to_value(&requests[3]).unwrap();
    assert_eq!(
        sync["arguments"]["breakpoints"],
        json!([{ "line": 3 }, { "line": 7 }])
    );
    assert_eq!(
        sync["arguments"]["source"]["path"],
        json!("/tmp/ipykernel_1/cell-0.py")
    );

    let execute = serde_json::to_value(&requests[5]).unwrap();
    assert_eq!(execute["arguments"]["code"], json!(CELL));

    assert!(session.started());
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.source_path(), Some("/tmp/ipykernel_1/cell-0.py"));
}

#[tokio::test]
async fn scenario_started_is_published_before_execute() {
    let (mut session, kernel) = new_session();
    let mut rx = session.subscribe();

    session.start().await.unwrap();

    let started = wait_for_event(&mut rx, |e| matches!(e, SessionEvent::StartedChanged(_))).await;
    assert_eq!(started, Some(SessionEvent::StartedChanged(true)));
    assert!(kernel.wait_for_requests(6).await);
    assert_eq!(kernel.commands().last(), Some(&"execute"));
}

#[tokio::test]
async fn scenario_toggle_adds_then_removes() {
    let (mut session, _kernel) = new_session();
    let mut rx = session.subscribe();

    session.toggle_breakpoint(3, "print(x)");
    let added = wait_for_event(&mut rx, |e| matches!(e, SessionEvent::BreakpointsChanged(_))).await;
    match added {
        Some(SessionEvent::BreakpointsChanged(bps)) => {
            assert_eq!(bps.len(), 1);
            assert_eq!(bps[0].line, 3);
            assert_eq!(bps[0].source_text, "print(x)");
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    session.toggle_breakpoint(3, "print(x)");
    let removed =
        wait_for_event(&mut rx, |e| matches!(e, SessionEvent::BreakpointsChanged(_))).await;
    assert_eq!(removed, Some(SessionEvent::BreakpointsChanged(vec![])));
    assert!(session.breakpoints().is_empty());
}

#[tokio::test]
async fn scenario_continue_with_nothing_left_stops() {
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();
    kernel.update(|script| script.variables.clear());
    let mut rx = session.subscribe();

    let outcome = session.continue_execution().await.unwrap();
    assert_eq!(outcome, ContinueOutcome::Finished);

    let commands = kernel.commands();
    assert!(!commands.contains(&"continue"));
    assert_eq!(commands.last(), Some(&"disconnect"));

    let disconnect = serde_json::to_value(kernel.requests().last().unwrap()).unwrap();
    assert_eq!(
        disconnect["arguments"],
        json!({ "restart": false, "terminateDebuggee": true })
    );

    assert!(!session.started());
    assert_eq!(session.state(), SessionState::Idle);
    let stopped = wait_for_event(&mut rx, |e| matches!(e, SessionEvent::StartedChanged(_))).await;
    assert_eq!(stopped, Some(SessionEvent::StartedChanged(false)));
}

#[tokio::test]
async fn scenario_continue_with_variables_resumes_thread() {
    let (mut session, kernel) = new_session();
    kernel.update(|script| script.thread_on_execute = Some(3));
    let mut rx = session.subscribe();
    session.start().await.unwrap();
    wait_for_event(&mut rx, |e| matches!(e, SessionEvent::ThreadStarted { .. }))
        .await
        .unwrap();

    let outcome = session.continue_execution().await.unwrap();
    assert_eq!(outcome, ContinueOutcome::Continued);
    assert_eq!(session.last_variables(), FakeKernel::default_variables());

    let last = kernel.requests().pop().unwrap();
    assert!(matches!(last.command, Command::Continue(ref args) if args.thread_id == 3));
    assert!(session.started());
}

#[tokio::test]
async fn scenario_stop_twice_sends_one_disconnect() {
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();

    session.stop().await.unwrap();
    let sent = kernel.requests().len();
    session.stop().await.unwrap();

    assert_eq!(kernel.requests().len(), sent);
    let disconnects = kernel
        .commands()
        .into_iter()
        .filter(|name| *name == "disconnect")
        .count();
    assert_eq!(disconnects, 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.listener_attached());
}

#[tokio::test]
async fn unmatched_reply_is_reported_and_pending_survive() {
    let (mut session, kernel) = new_session();
    let mut rx = session.subscribe();
    session.start().await.unwrap();
    // The silent execute stays pending.
    assert_eq!(session.pending_requests(), 1);

    assert!(kernel.reply_raw(Reply::success(999, "evaluate", None)).await);

    let violation =
        wait_for_event(&mut rx, |e| matches!(e, SessionEvent::ProtocolViolation { .. })).await;
    assert_eq!(
        violation,
        Some(SessionEvent::ProtocolViolation { request_seq: 999 })
    );
    assert_eq!(session.pending_requests(), 1);

    let variables = session.get_variables().await.unwrap();
    assert_eq!(variables.len(), 2);
}

#[tokio::test]
async fn start_while_running_is_rejected_without_side_effects() {
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();
    assert!(kernel.wait_for_requests(6).await);
    let sent = kernel.requests().len();

    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        DapError::InvalidTransition {
            operation: "start",
            state: SessionState::Running
        }
    ));
    assert_eq!(kernel.requests().len(), sent);
    assert_eq!(session.state(), SessionState::Running);
    assert!(session.listener_attached());
}

#[tokio::test]
async fn listener_is_detached_on_every_exit_path() {
    // Handshake failure.
    let (mut session, kernel) = new_session();
    kernel.update(|script| script.fail.insert("initialize"));
    assert!(session.start().await.is_err());
    assert!(!session.listener_attached());

    // Explicit stop.
    let (mut session, _kernel) = new_session();
    session.start().await.unwrap();
    assert!(session.listener_attached());
    session.stop().await.unwrap();
    assert!(!session.listener_attached());

    // Stop after a failed disconnect.
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();
    kernel.update(|script| script.fail.insert("disconnect"));
    assert!(session.stop().await.is_err());
    assert!(!session.listener_attached());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn thread_id_defaults_to_sentinel_until_announced() {
    let (mut session, kernel) = new_session();
    assert_eq!(session.thread_id(), DEFAULT_THREAD_ID);
    assert_eq!(DEFAULT_THREAD_ID, 1);

    let mut rx = session.subscribe();
    session.start().await.unwrap();
    session.step_over().await.unwrap();
    let step = kernel.requests().pop().unwrap();
    assert!(matches!(step.command, Command::Next(ref args) if args.thread_id == 1));

    kernel.emit(Event::thread_started(9));
    wait_for_event(&mut rx, |e| *e == SessionEvent::ThreadStarted { thread_id: 9 })
        .await
        .unwrap();
    assert_eq!(session.thread_id(), 9);

    session.stop().await.unwrap();
    assert_eq!(session.thread_id(), DEFAULT_THREAD_ID);
}

#[tokio::test]
async fn transport_close_fails_requests() {
    let (mut session, mut kernel) = new_session();
    session.start().await.unwrap();

    kernel.close();

    let err = session.get_variables().await.unwrap_err();
    assert!(matches!(err, DapError::TransportClosed), "got {err:?}");
    assert_eq!(session.pending_requests(), 0);

    // Stop still tears down even though disconnect cannot be sent.
    assert!(session.stop().await.is_err());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.started());
}

#[tokio::test]
async fn restart_after_stop_resets_sequence() {
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();
    session.stop().await.unwrap();
    let first_run = kernel.requests().len();

    session.start().await.unwrap();
    assert!(kernel.wait_for_requests(first_run + 6).await);
    let second_run = &kernel.requests()[first_run..];
    assert_eq!(second_run[0].seq, 0);
    assert!(matches!(second_run[0].command, Command::Initialize(_)));
}

#[tokio::test]
async fn abandoned_handshake_rejects_start_until_stopped() {
    let (mut session, kernel) = new_session();
    kernel.update(|script| script.silent.insert("attach"));

    let hung = tokio::time::timeout(Duration::from_millis(100), session.start()).await;
    assert!(hung.is_err(), "handshake should still be waiting on attach");
    assert_eq!(session.state(), SessionState::Handshaking);
    assert!(session.listener_attached());
    assert!(!session.started());

    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        DapError::InvalidTransition {
            operation: "start",
            state: SessionState::Handshaking
        }
    ));
    assert_eq!(kernel.commands(), vec!["initialize", "attach"]);

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.listener_attached());
    assert_eq!(session.pending_requests(), 0);
    assert_eq!(kernel.commands(), vec!["initialize", "attach", "disconnect"]);
}

#[tokio::test]
async fn execute_reply_after_stop_is_not_a_violation() {
    let (mut session, kernel) = new_session();
    session.start().await.unwrap();
    assert!(kernel.wait_for_requests(6).await);
    let execute_seq = kernel.requests()[5].seq;
    session.stop().await.unwrap();
    let mut rx = session.subscribe();

    assert!(kernel.reply_raw(Reply::success(execute_seq, "execute", None)).await);
    assert!(kernel.reply_raw(Reply::success(999, "evaluate", None)).await);

    // Replies are routed in order, so the first violation seen is the stray one.
    let violation =
        wait_for_event(&mut rx, |e| matches!(e, SessionEvent::ProtocolViolation { .. })).await;
    assert_eq!(
        violation,
        Some(SessionEvent::ProtocolViolation { request_seq: 999 })
    );
}
