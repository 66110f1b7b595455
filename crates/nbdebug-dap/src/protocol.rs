//! Debug protocol message types.
//!
//! Outgoing requests are a closed set of [`Command`] variants, each with a
//! fixed argument record. Incoming traffic is either a [`Reply`] correlated
//! by `request_seq` or an uncorrelated [`Event`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::breakpoint::Breakpoint;
use crate::error::DapError;

// ---------------------------------------------------------------------------
// Base protocol messages
// ---------------------------------------------------------------------------

/// An outgoing request. Immutable once handed to the correlator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Sequence number.
    pub seq: i64,
    /// Always "request".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The command and its arguments.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Build a request with the given sequence number.
    pub fn new(seq: i64, command: Command) -> Self {
        Self {
            seq,
            message_type: "request".into(),
            command,
        }
    }
}

/// Every command the engine knows how to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "arguments", rename_all = "camelCase")]
pub enum Command {
    Initialize(InitializeArguments),
    Attach(AttachArguments),
    UpdateCell(UpdateCellArguments),
    SetBreakpoints(SetBreakpointsArguments),
    ConfigurationDone,
    StackTrace(StackTraceArguments),
    Scopes(ScopesArguments),
    Variables(VariablesArguments),
    Continue(ContinueArguments),
    Next(NextArguments),
    Evaluate(EvaluateArguments),
    Disconnect(DisconnectArguments),
    Execute(ExecuteArguments),
}

impl Command {
    /// The wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize(_) => "initialize",
            Command::Attach(_) => "attach",
            Command::UpdateCell(_) => "updateCell",
            Command::SetBreakpoints(_) => "setBreakpoints",
            Command::ConfigurationDone => "configurationDone",
            Command::StackTrace(_) => "stackTrace",
            Command::Scopes(_) => "scopes",
            Command::Variables(_) => "variables",
            Command::Continue(_) => "continue",
            Command::Next(_) => "next",
            Command::Evaluate(_) => "evaluate",
            Command::Disconnect(_) => "disconnect",
            Command::Execute(_) => "execute",
        }
    }

    /// Check the arguments before the command is given a sequence number.
    pub fn validate(&self) -> Result<(), DapError> {
        match self {
            Command::Attach(args) if args.cwd.is_empty() => {
                Err(DapError::InvalidRequest("attach: cwd must not be empty".into()))
            }
            Command::SetBreakpoints(args) => args.validate(),
            Command::Variables(args) if args.variables_reference <= 0 => {
                Err(DapError::InvalidRequest(format!(
                    "variables: variablesReference must be positive, got {}",
                    args.variables_reference
                )))
            }
            Command::Evaluate(args) => args.validate(),
            _ => Ok(()),
        }
    }
}

/// A reply to a previously sent [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Sequence number of the reply itself.
    #[serde(default)]
    pub seq: i64,
    /// Always "response".
    #[serde(rename = "type", default = "response_type")]
    pub message_type: String,
    /// Sequence number of the request this reply answers.
    pub request_seq: i64,
    /// Whether the request succeeded.
    pub success: bool,
    /// The command this reply is for.
    #[serde(default)]
    pub command: String,
    /// Error message if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Command-specific body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn response_type() -> String {
    "response".into()
}

impl Reply {
    /// A successful reply.
    pub fn success(
        request_seq: i64,
        command: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Self {
            seq: 0,
            message_type: response_type(),
            request_seq,
            success: true,
            command: command.into(),
            message: None,
            body,
        }
    }

    /// A failed reply carrying an error message.
    pub fn failure(request_seq: i64, command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            message_type: response_type(),
            request_seq,
            success: false,
            command: command.into(),
            message: Some(message.into()),
            body: None,
        }
    }

    /// Turn a `success: false` reply into [`DapError::Rejected`].
    pub fn ensure_success(self) -> Result<Self, DapError> {
        if self.success {
            Ok(self)
        } else {
            Err(DapError::Rejected {
                message: self
                    .message
                    .unwrap_or_else(|| "no message".to_string()),
                command: self.command,
            })
        }
    }

    /// Decode the body of a successful reply.
    ///
    /// A missing body or one that does not match `T` is a
    /// [`DapError::Protocol`] error.
    pub fn body_as<T: DeserializeOwned>(self) -> Result<T, DapError> {
        let reply = self.ensure_success()?;
        let body = reply.body.ok_or_else(|| {
            DapError::Protocol(format!("{} reply has no body", reply.command))
        })?;
        serde_json::from_value(body)
            .map_err(|e| DapError::Protocol(format!("{} reply body: {e}", reply.command)))
    }
}

/// An asynchronous notification, not tied to any request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number.
    #[serde(default)]
    pub seq: i64,
    /// Always "event".
    #[serde(rename = "type", default = "event_type")]
    pub message_type: String,
    /// The event type.
    pub event: String,
    /// Event-specific body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn event_type() -> String {
    "event".into()
}

/// Event kinds the engine distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A new execution thread became active.
    ThreadStarted,
    /// Anything else; left to collaborators.
    Other(String),
}

impl Event {
    /// Build an event.
    pub fn new(event: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            seq: 0,
            message_type: event_type(),
            event: event.into(),
            body,
        }
    }

    /// A `thread` event announcing that `thread_id` started.
    pub fn thread_started(thread_id: i64) -> Self {
        Self::new(
            "thread",
            Some(serde_json::json!({ "reason": "started", "threadId": thread_id })),
        )
    }

    /// Classify this event.
    pub fn kind(&self) -> EventKind {
        if self.started_thread_id().is_some() {
            EventKind::ThreadStarted
        } else {
            EventKind::Other(self.event.clone())
        }
    }

    /// The thread id if this is a thread-started notification.
    ///
    /// Accepts both `{event:"thread", body:{reason:"started"}}` and the
    /// shorthand `thread-started` kind.
    pub fn started_thread_id(&self) -> Option<i64> {
        let body = self.body.as_ref()?;
        match self.event.as_str() {
            "thread" if body.get("reason")?.as_str()? == "started" => {
                body.get("threadId")?.as_i64()
            }
            "thread-started" => body.get("threadId")?.as_i64(),
            _ => None,
        }
    }
}

/// A message read from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A reply to one of our requests.
    Reply(Reply),
    /// An uncorrelated notification.
    Event(Event),
}

impl Incoming {
    /// Classify a decoded JSON message by its `type` field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DapError> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DapError::Protocol("message has no type".into()))?
            .to_string();
        match kind.as_str() {
            "response" => serde_json::from_value(value)
                .map(Incoming::Reply)
                .map_err(|e| DapError::Protocol(format!("malformed response: {e}"))),
            "event" => serde_json::from_value(value)
                .map(Incoming::Event)
                .map_err(|e| DapError::Protocol(format!("malformed event: {e}"))),
            other => Err(DapError::Protocol(format!(
                "unexpected message type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake arguments
// ---------------------------------------------------------------------------

/// Arguments for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    /// ID of the client.
    pub client_id: String,
    /// Human-readable name of the client.
    pub client_name: String,
    /// ID of the debug adapter.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Path format: "path" or "uri".
    pub path_format: String,
    /// Whether lines are 1-based.
    pub lines_start_at1: bool,
    /// Whether columns are 1-based.
    pub columns_start_at1: bool,
    /// Whether the client shows variable types.
    pub supports_variable_type: bool,
    /// Whether the client pages through variables.
    pub supports_variable_paging: bool,
    /// Whether the client supports the `runInTerminal` request.
    pub supports_run_in_terminal_request: bool,
    /// Client locale.
    pub locale: String,
}

impl InitializeArguments {
    /// The arguments nbdebug announces for the given adapter.
    pub fn for_adapter(adapter_id: impl Into<String>) -> Self {
        Self {
            client_id: "nbdebug".into(),
            client_name: "nbdebug".into(),
            adapter_id: adapter_id.into(),
            path_format: "path".into(),
            lines_start_at1: true,
            columns_start_at1: true,
            supports_variable_type: true,
            supports_variable_paging: true,
            supports_run_in_terminal_request: true,
            locale: "en-US".into(),
        }
    }
}

/// Arguments for the `attach` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachArguments {
    /// Working directory of the debuggee.
    pub cwd: String,
    /// Restrict stepping to user code.
    pub just_my_code: bool,
}

/// Arguments for the `updateCell` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellArguments {
    /// Cell being replaced.
    pub cell_id: i64,
    /// Id the cell takes after the update.
    pub next_id: i64,
    /// Full cell source.
    pub code: String,
}

/// Response body for `updateCell`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellResponseBody {
    /// Path the backend stored the cell source under.
    pub source_path: String,
}

/// A source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File system path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A source breakpoint as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// The source line of the breakpoint.
    pub line: i64,
}

/// Arguments for the `setBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    /// The source to set breakpoints for.
    pub source: Source,
    /// Breakpoints to set (replaces all previous ones).
    pub breakpoints: Vec<SourceBreakpoint>,
    /// The same lines, as a flat list.
    pub lines: Vec<i64>,
    /// Whether the source changed since it was sent.
    pub source_modified: bool,
}

impl SetBreakpointsArguments {
    /// Build the arguments for `path` from an ordered breakpoint snapshot.
    pub fn from_breakpoints(path: impl Into<String>, breakpoints: &[Breakpoint]) -> Self {
        let lines: Vec<i64> = breakpoints.iter().map(|bp| i64::from(bp.line)).collect();
        Self {
            source: Source {
                name: None,
                path: Some(path.into()),
            },
            breakpoints: lines
                .iter()
                .map(|&line| SourceBreakpoint { line })
                .collect(),
            lines,
            source_modified: false,
        }
    }

    fn validate(&self) -> Result<(), DapError> {
        if self.source.path.as_deref().map_or(true, str::is_empty) {
            return Err(DapError::InvalidRequest(
                "setBreakpoints: source path must not be empty".into(),
            ));
        }
        let bp_lines = self.breakpoints.iter().map(|bp| bp.line);
        if !bp_lines.eq(self.lines.iter().copied()) {
            return Err(DapError::InvalidRequest(
                "setBreakpoints: lines disagree with breakpoints".into(),
            ));
        }
        Ok(())
    }
}

/// Response body for `setBreakpoints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
    /// Information about the breakpoints.
    pub breakpoints: Vec<BreakpointResponse>,
}

/// A breakpoint as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResponse {
    /// Whether the breakpoint has been verified.
    pub verified: bool,
    /// Actual line of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Arguments for the `stackTrace` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// Thread to walk.
    pub thread_id: i64,
}

/// Response body for `stackTrace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    /// Frames, innermost first.
    pub stack_frames: Vec<StackFrame>,
}

/// A stack frame in the call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Unique identifier for the stack frame.
    pub id: i64,
    /// Name of the frame (function name).
    pub name: String,
    /// Line within the source.
    pub line: i64,
}

/// Arguments for the `scopes` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    /// Frame whose scopes are wanted.
    pub frame_id: i64,
}

/// Response body for `scopes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesResponseBody {
    /// Scopes of the frame.
    pub scopes: Vec<Scope>,
}

/// A named grouping of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Name of the scope (e.g. "Locals", "Globals").
    pub name: String,
    /// Handle used to fetch the scope's variables.
    pub variables_reference: i64,
}

/// Arguments for the `variables` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    /// Handle from a scope or structured variable.
    pub variables_reference: i64,
}

/// Response body for `variables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesResponseBody {
    /// The variables.
    pub variables: Vec<Variable>,
}

/// A variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Name of the variable.
    pub name: String,
    /// Value of the variable as a string.
    pub value: String,
    /// Type of the variable.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    /// If > 0, the variable has children accessed via this reference.
    #[serde(default)]
    pub variables_reference: i64,
}

/// Arguments for the `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    /// The expression to evaluate.
    pub expression: String,
    /// Stack frame in whose context to evaluate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    /// Context: "watch", "repl", "hover", "clipboard".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl EvaluateArguments {
    /// Arguments for evaluating `expression` at the console.
    pub fn repl(expression: impl Into<String>, frame_id: Option<i64>) -> Self {
        Self {
            expression: expression.into(),
            frame_id,
            context: Some("repl".into()),
        }
    }

    /// Reject blank expressions.
    pub fn validate(&self) -> Result<(), DapError> {
        if self.expression.trim().is_empty() {
            return Err(DapError::InvalidRequest(
                "evaluate: expression must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Response body for `evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    /// The result string.
    pub result: String,
    /// Type of the result.
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    /// If > 0, the result has children.
    #[serde(default)]
    pub variables_reference: i64,
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

/// Arguments for the `continue` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    /// The thread to continue.
    pub thread_id: i64,
}

/// Arguments for the `next` (step over) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextArguments {
    /// The thread to step.
    pub thread_id: i64,
}

/// Arguments for the `disconnect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    /// Whether to restart the debuggee.
    pub restart: bool,
    /// Whether to terminate the debuggee.
    pub terminate_debuggee: bool,
}

/// Arguments for the `execute` side request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteArguments {
    /// Raw source text to run.
    pub code: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_request_wire_shape() {
        let req = Request::new(
            4,
            Command::Attach(AttachArguments {
                cwd: "/tmp/".into(),
                just_my_code: false,
            }),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["seq"], 4);
        assert_eq!(json["type"], "request");
        assert_eq!(json["command"], "attach");
        assert_eq!(json["arguments"]["cwd"], "/tmp/");
        assert_eq!(json["arguments"]["justMyCode"], false);
    }

    #[test]
    fn protocol_configuration_done_has_no_arguments() {
        let req = Request::new(8, Command::ConfigurationDone);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["command"], "configurationDone");
        assert!(json.get("arguments").is_none());
    }

    #[test]
    fn protocol_command_names_match_wire() {
        let commands = vec![
            Command::UpdateCell(UpdateCellArguments {
                cell_id: 0,
                next_id: 1,
                code: "x = 1".into(),
            }),
            Command::StackTrace(StackTraceArguments { thread_id: 1 }),
            Command::Disconnect(DisconnectArguments {
                restart: false,
                terminate_debuggee: true,
            }),
            Command::Execute(ExecuteArguments { code: "x".into() }),
        ];
        for command in commands {
            let json = serde_json::to_value(Request::new(0, command.clone())).unwrap();
            assert_eq!(json["command"], command.name());
        }
    }

    #[test]
    fn protocol_initialize_uses_adapter_id_key() {
        let json = serde_json::to_value(InitializeArguments::for_adapter("python")).unwrap();
        assert_eq!(json["adapterID"], "python");
        assert_eq!(json["linesStartAt1"], true);
        assert_eq!(json["pathFormat"], "path");
    }

    #[test]
    fn protocol_set_breakpoints_from_snapshot() {
        let bps = vec![Breakpoint::new(3, "a = 1"), Breakpoint::new(7, "b = 2")];
        let args = SetBreakpointsArguments::from_breakpoints("/tmp/cell.py", &bps);
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["source"]["path"], "/tmp/cell.py");
        assert_eq!(json["breakpoints"], serde_json::json!([{"line": 3}, {"line": 7}]));
        assert_eq!(json["lines"], serde_json::json!([3, 7]));
        assert_eq!(json["sourceModified"], false);
        assert!(Command::SetBreakpoints(args).validate().is_ok());
    }

    #[test]
    fn protocol_validate_rejects_bad_arguments() {
        let empty_cwd = Command::Attach(AttachArguments {
            cwd: String::new(),
            just_my_code: true,
        });
        assert!(matches!(
            empty_cwd.validate(),
            Err(DapError::InvalidRequest(_))
        ));

        let no_path = Command::SetBreakpoints(SetBreakpointsArguments::from_breakpoints("", &[]));
        assert!(matches!(no_path.validate(), Err(DapError::InvalidRequest(_))));

        let mut mismatched = SetBreakpointsArguments::from_breakpoints("/a.py", &[]);
        mismatched.lines.push(4);
        assert!(matches!(
            Command::SetBreakpoints(mismatched).validate(),
            Err(DapError::InvalidRequest(_))
        ));

        let zero_ref = Command::Variables(VariablesArguments {
            variables_reference: 0,
        });
        assert!(matches!(zero_ref.validate(), Err(DapError::InvalidRequest(_))));

        let blank = Command::Evaluate(EvaluateArguments {
            expression: "  ".into(),
            frame_id: None,
            context: None,
        });
        assert!(matches!(blank.validate(), Err(DapError::InvalidRequest(_))));
    }

    #[test]
    fn protocol_reply_body_decoding() {
        let reply = Reply::success(
            4,
            "updateCell",
            Some(serde_json::json!({"sourcePath": "/tmp/ipykernel/123.py"})),
        );
        let body: UpdateCellResponseBody = reply.body_as().unwrap();
        assert_eq!(body.source_path, "/tmp/ipykernel/123.py");
    }

    #[test]
    fn protocol_reply_missing_body_is_protocol_error() {
        let reply = Reply::success(10, "stackTrace", None);
        let err = reply.body_as::<StackTraceResponseBody>().unwrap_err();
        assert!(matches!(err, DapError::Protocol(_)), "got {err:?}");
    }

    #[test]
    fn protocol_reply_malformed_body_is_protocol_error() {
        let reply = Reply::success(10, "scopes", Some(serde_json::json!({"scopes": 3})));
        let err = reply.body_as::<ScopesResponseBody>().unwrap_err();
        assert!(matches!(err, DapError::Protocol(_)), "got {err:?}");
    }

    #[test]
    fn protocol_failed_reply_is_rejected() {
        let reply = Reply::failure(2, "attach", "no kernel");
        let err = reply.ensure_success().unwrap_err();
        match err {
            DapError::Rejected { command, message } => {
                assert_eq!(command, "attach");
                assert_eq!(message, "no kernel");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn protocol_thread_started_forms() {
        assert_eq!(Event::thread_started(7).started_thread_id(), Some(7));
        assert_eq!(Event::thread_started(7).kind(), EventKind::ThreadStarted);

        let shorthand = Event::new("thread-started", Some(serde_json::json!({"threadId": 3})));
        assert_eq!(shorthand.started_thread_id(), Some(3));

        let exited = Event::new(
            "thread",
            Some(serde_json::json!({"reason": "exited", "threadId": 3})),
        );
        assert_eq!(exited.started_thread_id(), None);

        let stopped = Event::new("stopped", Some(serde_json::json!({"threadId": 3})));
        assert_eq!(stopped.kind(), EventKind::Other("stopped".into()));
    }

    #[test]
    fn protocol_incoming_classification() {
        let reply = serde_json::json!({
            "seq": 9, "type": "response", "request_seq": 2,
            "success": true, "command": "attach"
        });
        assert!(matches!(
            Incoming::from_value(reply).unwrap(),
            Incoming::Reply(Reply { request_seq: 2, .. })
        ));

        let event = serde_json::json!({
            "seq": 10, "type": "event", "event": "thread",
            "body": {"reason": "started", "threadId": 5}
        });
        match Incoming::from_value(event).unwrap() {
            Incoming::Event(evt) => assert_eq!(evt.started_thread_id(), Some(5)),
            other => panic!("expected event, got {other:?}"),
        }

        let request = serde_json::json!({"seq": 1, "type": "request", "command": "runInTerminal"});
        assert!(matches!(
            Incoming::from_value(request),
            Err(DapError::Protocol(_))
        ));
        assert!(matches!(
            Incoming::from_value(serde_json::json!({"seq": 1})),
            Err(DapError::Protocol(_))
        ));
    }

    #[test]
    fn protocol_variable_defaults_reference() {
        let var: Variable =
            serde_json::from_value(serde_json::json!({"name": "x", "value": "1"})).unwrap();
        assert_eq!(var.variables_reference, 0);
        assert_eq!(var.variable_type, None);
    }
}
