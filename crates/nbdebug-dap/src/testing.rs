//! Scripted in-memory backend for exercising the engine without a kernel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::protocol::{Command, Event, Reply, Request, Scope, StackFrame, Variable};
use crate::transport::{BackendChannels, Connection};

/// Channel capacity of the fake link.
const FAKE_CAPACITY: usize = 64;

/// What the fake kernel answers with.
#[derive(Debug, Clone)]
pub struct Script {
    /// Frames returned by `stackTrace`.
    pub frames: Vec<StackFrame>,
    /// Scopes returned by `scopes`.
    pub scopes: Vec<Scope>,
    /// Variables returned by `variables`.
    pub variables: Vec<Variable>,
    /// Path returned by `updateCell`.
    pub source_path: String,
    /// Result string returned by `evaluate`.
    pub evaluate_result: String,
    /// Commands answered with `success: false`.
    pub fail: HashSet<&'static str>,
    /// Commands that never get a reply.
    pub silent: HashSet<&'static str>,
    /// Commands answered successfully but without a body.
    pub empty_body: HashSet<&'static str>,
    /// Thread announced when `execute` arrives.
    pub thread_on_execute: Option<i64>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            frames: vec![StackFrame {
                id: 100,
                name: "<module>".into(),
                line: 3,
            }],
            scopes: vec![
                Scope {
                    name: "Locals".into(),
                    variables_reference: 1000,
                },
                Scope {
                    name: "Globals".into(),
                    variables_reference: 2000,
                },
            ],
            variables: FakeKernel::default_variables(),
            source_path: "/tmp/ipykernel_1/cell-0.py".into(),
            evaluate_result: "42".into(),
            fail: HashSet::new(),
            // Execution blocks at breakpoints; it normally never answers.
            silent: HashSet::from(["execute"]),
            empty_body: HashSet::new(),
            thread_on_execute: None,
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    script: Script,
    requests: Vec<Request>,
}

/// Handle to a running fake kernel.
///
/// Every request is recorded; replies are produced from the [`Script`].
#[derive(Debug)]
pub struct FakeKernel {
    recorded: Arc<Mutex<Recorded>>,
    replies: Option<mpsc::Sender<Reply>>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<()>,
}

impl FakeKernel {
    /// Spawn a fake kernel and return the engine's end of the link.
    pub fn spawn() -> (Connection, FakeKernel) {
        let (connection, backend) = Connection::in_memory(FAKE_CAPACITY);
        let BackendChannels {
            requests,
            replies,
            events,
        } = backend;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let task = tokio::spawn(serve(
            requests,
            replies.clone(),
            events.clone(),
            recorded.clone(),
        ));
        let kernel = FakeKernel {
            recorded,
            replies: Some(replies),
            events,
            task,
        };
        (connection, kernel)
    }

    /// Variables the default script reports.
    pub fn default_variables() -> Vec<Variable> {
        vec![
            Variable {
                name: "x".into(),
                value: "1".into(),
                variable_type: Some("int".into()),
                variables_reference: 0,
            },
            Variable {
                name: "items".into(),
                value: "[1, 2]".into(),
                variable_type: Some("list".into()),
                variables_reference: 1001,
            },
        ]
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the script.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Script) -> T) -> T {
        edit(&mut self.lock().script)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Command names received so far, in arrival order.
    pub fn commands(&self) -> Vec<&'static str> {
        self.lock()
            .requests
            .iter()
            .map(|req| req.command.name())
            .collect()
    }

    /// Wait until at least `count` requests have arrived.
    ///
    /// Returns false if they did not arrive within a second.
    pub async fn wait_for_requests(&self, count: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while self.lock().requests.len() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Publish an event on the notification channel.
    pub fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Push a reply the script did not produce.
    pub async fn reply_raw(&self, reply: Reply) -> bool {
        match &self.replies {
            Some(replies) => replies.send(reply).await.is_ok(),
            None => false,
        }
    }

    /// Drop the link: pending engine requests see the transport close.
    pub fn close(&mut self) {
        self.task.abort();
        self.replies = None;
    }
}

impl Drop for FakeKernel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut requests: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Reply>,
    events: broadcast::Sender<Event>,
    recorded: Arc<Mutex<Recorded>>,
) {
    let mut seq = 1;
    while let Some(request) = requests.recv().await {
        let reply = {
            let mut recorded = recorded.lock().unwrap_or_else(PoisonError::into_inner);
            let reply = scripted_reply(&recorded.script, &request);
            if let (Command::Execute(_), Some(thread_id)) =
                (&request.command, recorded.script.thread_on_execute)
            {
                let _ = events.send(Event::thread_started(thread_id));
            }
            recorded.requests.push(request);
            reply
        };
        if let Some(mut reply) = reply {
            reply.seq = seq;
            seq += 2;
            if replies.send(reply).await.is_err() {
                break;
            }
        }
    }
}

fn scripted_reply(script: &Script, request: &Request) -> Option<Reply> {
    let name = request.command.name();
    if script.silent.contains(name) {
        return None;
    }
    if script.fail.contains(name) {
        return Some(Reply::failure(request.seq, name, format!("{name} failed")));
    }
    if script.empty_body.contains(name) {
        return Some(Reply::success(request.seq, name, None));
    }

    let body = match &request.command {
        Command::Initialize(_) => Some(json!({
            "supportsConfigurationDoneRequest": true,
            "supportsEvaluateForHovers": true
        })),
        Command::UpdateCell(_) => Some(json!({ "sourcePath": script.source_path })),
        Command::SetBreakpoints(args) => {
            let verified: Vec<_> = args
                .lines
                .iter()
                .map(|line| json!({ "verified": true, "line": line }))
                .collect();
            Some(json!({ "breakpoints": verified }))
        }
        Command::StackTrace(_) => Some(json!({ "stackFrames": script.frames })),
        Command::Scopes(_) => Some(json!({ "scopes": script.scopes })),
        Command::Variables(_) => Some(json!({ "variables": script.variables })),
        Command::Evaluate(_) => Some(json!({
            "result": script.evaluate_result,
            "variablesReference": 0
        })),
        Command::Continue(_) => Some(json!({ "allThreadsContinued": true })),
        Command::Attach(_)
        | Command::ConfigurationDone
        | Command::Next(_)
        | Command::Disconnect(_)
        | Command::Execute(_) => None,
    };
    Some(Reply::success(request.seq, name, body))
}
