//! Stack trace → scopes → variables resolution.

use crate::correlator::Correlator;
use crate::error::DapError;
use crate::protocol::{
    Command, Scope, ScopesArguments, ScopesResponseBody, StackFrame, StackTraceArguments,
    StackTraceResponseBody, Variable, VariablesArguments, VariablesResponseBody,
};

/// Resolves the variables visible in a paused thread.
///
/// Each stage needs the previous stage's answer, so the three requests are
/// strictly sequential. Only the innermost frame and its first scope are
/// inspected.
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    correlator: &'a Correlator,
}

impl<'a> VariableResolver<'a> {
    pub fn new(correlator: &'a Correlator) -> Self {
        Self { correlator }
    }

    /// Resolve the first scope of the innermost frame of `thread_id`.
    ///
    /// An empty result means there was nothing to inspect (no frames or no
    /// scopes). Malformed replies are errors, never an empty result.
    pub async fn resolve(&self, thread_id: i64) -> Result<Vec<Variable>, DapError> {
        let frames = self.stack_trace(thread_id).await?;
        let Some(frame) = frames.first() else {
            tracing::debug!(thread_id, "no stack frames");
            return Ok(Vec::new());
        };

        let scopes = self.scopes(frame.id).await?;
        let Some(scope) = scopes.first() else {
            tracing::debug!(frame_id = frame.id, "no scopes");
            return Ok(Vec::new());
        };

        if scope.variables_reference <= 0 {
            return Err(DapError::Protocol(format!(
                "scope '{}' has no variables reference ({})",
                scope.name, scope.variables_reference
            )));
        }
        self.variables(scope.variables_reference).await
    }

    /// Frames of `thread_id`, innermost first.
    pub async fn stack_trace(&self, thread_id: i64) -> Result<Vec<StackFrame>, DapError> {
        let reply = self
            .correlator
            .send(Command::StackTrace(StackTraceArguments { thread_id }))
            .await?;
        let body: StackTraceResponseBody = reply.body_as()?;
        Ok(body.stack_frames)
    }

    /// Scopes of the frame `frame_id`.
    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, DapError> {
        let reply = self
            .correlator
            .send(Command::Scopes(ScopesArguments { frame_id }))
            .await?;
        let body: ScopesResponseBody = reply.body_as()?;
        Ok(body.scopes)
    }

    /// Variables behind `variables_reference`.
    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, DapError> {
        let reply = self
            .correlator
            .send(Command::Variables(VariablesArguments {
                variables_reference,
            }))
            .await?;
        let body: VariablesResponseBody = reply.body_as()?;
        Ok(body.variables)
    }
}
