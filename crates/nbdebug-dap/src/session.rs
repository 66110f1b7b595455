//! Debug session lifecycle.
//!
//! Sequences the startup handshake, the run/pause cycle and teardown, and
//! owns every other engine component for the life of one backend link.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::breakpoint::{Breakpoint, BreakpointStore, Toggle};
use crate::bus::{EventBus, SessionEvent};
use crate::correlator::{Correlator, PendingReply};
use crate::error::DapError;
use crate::events::EventListener;
use crate::protocol::{
    AttachArguments, Command, ContinueArguments, DisconnectArguments, EvaluateArguments,
    EvaluateResponseBody, Event, ExecuteArguments, InitializeArguments, NextArguments, Reply,
    SetBreakpointsArguments, UpdateCellArguments, UpdateCellResponseBody, Variable,
};
use crate::transport::Connection;
use crate::variables::VariableResolver;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; `start` is allowed.
    Idle,
    /// The startup handshake is in flight.
    Handshaking,
    /// Handshake done; the cell is executing or paused.
    Running,
    /// Teardown is in flight.
    Stopping,
}

/// Fixed parameters of the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Working directory sent with `attach`.
    pub cwd: String,
    /// Restrict stepping to user code.
    pub just_my_code: bool,
    /// Cell replaced by `updateCell`.
    pub cell_id: i64,
    /// Id the cell takes after `updateCell`.
    pub next_id: i64,
    /// Adapter id announced in `initialize`.
    pub adapter_id: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cwd: "/tmp/".into(),
            just_my_code: false,
            cell_id: 0,
            next_id: 1,
            adapter_id: "python".into(),
        }
    }
}

/// What [`DebugSession::continue_execution`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// A `continue` request was acknowledged.
    Continued,
    /// Nothing was left to inspect, so the session was stopped instead.
    Finished,
}

/// A debug session against one backend.
///
/// Operations take `&mut self`, so at most one lifecycle operation is in
/// flight per instance. A `start` future dropped mid-handshake leaves the
/// session in [`SessionState::Handshaking`]; only [`stop`](Self::stop)
/// recovers from that.
pub struct DebugSession {
    options: SessionOptions,
    state: SessionState,
    started: bool,
    correlator: Correlator,
    events: broadcast::Sender<Event>,
    listener: EventListener,
    breakpoints: BreakpointStore,
    bus: EventBus,
    execution: Option<JoinHandle<()>>,
    source: String,
    source_path: Option<String>,
    last_variables: Vec<Variable>,
}

impl DebugSession {
    /// Create an idle session over `connection`.
    ///
    /// Must be called from within a tokio runtime: the reply router is
    /// spawned immediately.
    pub fn new(connection: Connection, options: SessionOptions) -> Self {
        let bus = EventBus::new();
        let (outgoing, replies, events) = connection.into_parts();
        Self {
            options,
            state: SessionState::Idle,
            started: false,
            correlator: Correlator::new(outgoing, replies, bus.clone()),
            events,
            listener: EventListener::new(),
            breakpoints: BreakpointStore::new(),
            bus,
            execution: None,
            source: String::new(),
            source_path: None,
            last_variables: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake completed and the session has not stopped.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The active thread, or the default until the backend announces one.
    pub fn thread_id(&self) -> i64 {
        self.listener.thread_id()
    }

    /// Whether the event listener is subscribed.
    pub fn listener_attached(&self) -> bool {
        self.listener.is_attached()
    }

    /// Subscribe to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// The cell source sent at the next `start`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Path the backend stored the cell under, while running.
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Variables from the most recent resolution in this run.
    pub fn last_variables(&self) -> &[Variable] {
        &self.last_variables
    }

    /// Requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    // -----------------------------------------------------------------
    // Breakpoints
    // -----------------------------------------------------------------

    /// Breakpoints sorted by line.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.list()
    }

    /// Add a breakpoint at `line`, or remove the one already there.
    ///
    /// Changes made while running are picked up by the next `start`.
    pub fn toggle_breakpoint(&mut self, line: u32, source_text: impl Into<String>) -> Toggle {
        let toggle = self.breakpoints.toggle(line, source_text);
        tracing::debug!(line, ?toggle, "breakpoint toggled");
        if self.state == SessionState::Running {
            tracing::debug!("breakpoint change applies to the next session");
        }
        self.publish_breakpoints();
        toggle
    }

    /// Replace every breakpoint, e.g. when the editor switches cells.
    pub fn set_breakpoints(&mut self, breakpoints: impl IntoIterator<Item = Breakpoint>) {
        self.breakpoints.replace(breakpoints);
        self.publish_breakpoints();
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
        self.publish_breakpoints();
    }

    fn publish_breakpoints(&self) {
        self.bus
            .publish(SessionEvent::BreakpointsChanged(self.breakpoints.list()));
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Run the startup handshake and launch the cell.
    ///
    /// On failure the session is back in [`SessionState::Idle`] with the
    /// listener detached, and the error is returned.
    pub async fn start(&mut self) -> Result<(), DapError> {
        self.require(SessionState::Idle, "start")?;
        tracing::info!("starting debug session");
        self.state = SessionState::Handshaking;
        self.correlator.reset();
        self.listener.reset_thread();

        if let Err(e) = self
            .listener
            .attach(self.events.subscribe(), self.bus.clone())
        {
            self.state = SessionState::Idle;
            return Err(e);
        }

        let source_path = match self.handshake().await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("handshake failed: {e}");
                self.listener.detach();
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        tracing::info!(%source_path, "debug session running");
        self.source_path = Some(source_path);
        self.state = SessionState::Running;
        self.started = true;
        self.bus.publish(SessionEvent::StartedChanged(true));

        let execute = Command::Execute(ExecuteArguments {
            code: self.source.clone(),
        });
        match self.correlator.submit(execute).await {
            Ok(pending) => self.execution = Some(tokio::spawn(watch_execution(pending))),
            Err(e) => tracing::warn!("execute not sent: {e}"),
        }
        Ok(())
    }

    async fn handshake(&mut self) -> Result<String, DapError> {
        let initialize = InitializeArguments::for_adapter(self.options.adapter_id.clone());
        self.request(Command::Initialize(initialize)).await?;

        self.request(Command::Attach(AttachArguments {
            cwd: self.options.cwd.clone(),
            just_my_code: self.options.just_my_code,
        }))
        .await?;

        let updated: UpdateCellResponseBody = self
            .request(Command::UpdateCell(UpdateCellArguments {
                cell_id: self.options.cell_id,
                next_id: self.options.next_id,
                code: self.source.clone(),
            }))
            .await?
            .body_as()?;

        let snapshot = self.breakpoints.list();
        tracing::debug!(count = snapshot.len(), "syncing breakpoints");
        let sync = SetBreakpointsArguments::from_breakpoints(updated.source_path.clone(), &snapshot);
        self.request(Command::SetBreakpoints(sync))
            .await
            .map_err(|e| match e {
                DapError::TransportClosed => DapError::TransportClosed,
                other => DapError::BreakpointSyncFailure(other.to_string()),
            })?;

        self.request(Command::ConfigurationDone).await?;
        Ok(updated.source_path)
    }

    /// Resume the paused cell.
    ///
    /// Resolves variables first; an empty result means the program has
    /// finished, in which case the session is stopped and no `continue`
    /// request is sent.
    pub async fn continue_execution(&mut self) -> Result<ContinueOutcome, DapError> {
        self.require(SessionState::Running, "continue")?;
        let variables = self.get_variables().await?;
        if variables.is_empty() {
            tracing::info!("nothing left to inspect; stopping session");
            self.stop().await?;
            return Ok(ContinueOutcome::Finished);
        }

        let thread_id = self.thread_id();
        self.request(Command::Continue(ContinueArguments { thread_id }))
            .await?;
        Ok(ContinueOutcome::Continued)
    }

    /// Variables of the innermost frame of the active thread.
    pub async fn get_variables(&mut self) -> Result<Vec<Variable>, DapError> {
        self.require(SessionState::Running, "get variables")?;
        let variables = VariableResolver::new(&self.correlator)
            .resolve(self.thread_id())
            .await?;
        self.last_variables = variables.clone();
        Ok(variables)
    }

    /// Step over the current line of the active thread.
    pub async fn step_over(&mut self) -> Result<(), DapError> {
        self.require(SessionState::Running, "step")?;
        let thread_id = self.thread_id();
        self.request(Command::Next(NextArguments { thread_id }))
            .await?;
        Ok(())
    }

    /// Evaluate `expression` in the innermost frame of the active thread.
    pub async fn evaluate(
        &mut self,
        expression: impl Into<String>,
    ) -> Result<EvaluateResponseBody, DapError> {
        self.require(SessionState::Running, "evaluate")?;
        let mut args = EvaluateArguments::repl(expression, None);
        args.validate()?;

        let frames = VariableResolver::new(&self.correlator)
            .stack_trace(self.thread_id())
            .await?;
        args.frame_id = frames.first().map(|frame| frame.id);
        self.request(Command::Evaluate(args)).await?.body_as()
    }

    /// Disconnect from the backend and return to [`SessionState::Idle`].
    ///
    /// Does nothing when already idle. The disconnect exchange is awaited
    /// but its failure does not prevent teardown; it is reported after the
    /// session is idle.
    pub async fn stop(&mut self) -> Result<(), DapError> {
        if self.state == SessionState::Idle {
            tracing::debug!("stop ignored: session idle");
            return Ok(());
        }
        tracing::info!(from = ?self.state, "stopping debug session");
        self.state = SessionState::Stopping;
        self.listener.detach();

        let result = self
            .request(Command::Disconnect(DisconnectArguments {
                restart: false,
                terminate_debuggee: true,
            }))
            .await
            .map(drop);
        if let Err(e) = &result {
            tracing::warn!("disconnect failed: {e}");
        }

        self.teardown();
        result
    }

    /// Stop the session and release it.
    pub async fn dispose(mut self) -> Result<(), DapError> {
        self.stop().await
    }

    fn teardown(&mut self) {
        self.listener.detach();
        if let Some(execution) = self.execution.take() {
            execution.abort();
        }
        let abandoned = self.correlator.fail_all();
        if abandoned > 0 {
            tracing::debug!(abandoned, "abandoned pending requests");
        }
        self.listener.reset_thread();
        self.last_variables.clear();
        self.source_path = None;
        self.state = SessionState::Idle;
        if self.started {
            self.started = false;
            self.bus.publish(SessionEvent::StartedChanged(false));
        }
        tracing::info!("debug session idle");
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), DapError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DapError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    async fn request(&self, command: Command) -> Result<Reply, DapError> {
        self.correlator.send(command).await?.ensure_success()
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        tracing::warn!(state = ?self.state, "session dropped while active; forcing teardown");
        self.listener.detach();
        let disconnect = Command::Disconnect(DisconnectArguments {
            restart: false,
            terminate_debuggee: true,
        });
        if let Err(e) = self.correlator.send_detached(disconnect) {
            tracing::debug!("disconnect on drop not sent: {e}");
        }
        self.teardown();
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("state", &self.state)
            .field("started", &self.started)
            .field("thread_id", &self.thread_id())
            .field("breakpoints", &self.breakpoints.len())
            .field("correlator", &self.correlator)
            .finish()
    }
}

async fn watch_execution(pending: PendingReply) {
    let seq = pending.seq();
    match pending.wait().await.and_then(Reply::ensure_success) {
        Ok(_) => tracing::info!(seq, "cell execution finished"),
        Err(DapError::TransportClosed) => tracing::debug!(seq, "cell execution abandoned"),
        Err(e) => tracing::warn!(seq, "cell execution failed: {e}"),
    }
}
