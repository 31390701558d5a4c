use std::str::FromStr;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::dispatch::{dispatch, Dispatch};
use crate::error::{EngineError, JobServiceError};
use crate::poll::{Poller, Tick};
use crate::registry::Registry;
use crate::sanitize::normalize_answer;
use crate::service::{JobHandle, JobService, RunStatus, ToolCallRequest, ToolCallResult};

pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(15_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Terminal result of one `resolve` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(String),
    Failed,
    TimedOut,
}

/// What to do when a tool callable returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolFailurePolicy {
    /// End the run with `Failed`.
    #[default]
    Abort,
    /// Submit an error payload for that call and keep going.
    Degrade,
}

impl FromStr for ToolFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ToolFailurePolicy::Abort),
            "degrade" => Ok(ToolFailurePolicy::Degrade),
            other => Err(format!("unknown tool failure policy '{other}' (expected 'abort' or 'degrade')")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub deadline: Duration,
    pub poll_interval: Duration,
    pub on_tool_failure: ToolFailurePolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_tool_failure: ToolFailurePolicy::default(),
        }
    }
}

enum BatchOutcome {
    Ready(Vec<ToolCallResult>),
    Aborted,
}

/// Drives a single run to completion, failure or timeout.
///
/// Holds only shared references; concurrent resolvers may share the same
/// service and registry.
pub struct RunResolver<'a> {
    service: &'a dyn JobService,
    registry: &'a Registry,
    clock: &'a dyn Clock,
    options: ResolveOptions,
}

impl<'a> RunResolver<'a> {
    pub fn new(service: &'a dyn JobService, registry: &'a Registry, clock: &'a dyn Clock) -> Self {
        Self { service, registry, clock, options: ResolveOptions::default() }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn resolve(&self, handle: &JobHandle) -> Result<RunOutcome, EngineError> {
        info!(thread_id = %handle.thread_id, run_id = %handle.run_id, "Resolving run");

        let poller = Poller::new(self.options.poll_interval, self.options.deadline);
        let outcome = poller
            .run(self.clock, move || self.step(handle))
            .await?
            .unwrap_or(RunOutcome::TimedOut);

        match &outcome {
            RunOutcome::Completed(_) => info!(run_id = %handle.run_id, "Run completed"),
            RunOutcome::Failed => error!(run_id = %handle.run_id, "Run failed"),
            RunOutcome::TimedOut => warn!(run_id = %handle.run_id, "Run timed out"),
        }
        Ok(outcome)
    }

    async fn step(&self, handle: &JobHandle) -> Result<Tick<RunOutcome>, EngineError> {
        let state = self.service.get_run_status(handle).await?;
        info!(run_id = %handle.run_id, status = ?state.status, "Checking run status");

        match state.status {
            RunStatus::Completed => {
                let answer = self.fetch_answer(&handle.thread_id).await?;
                Ok(Tick::Ready(RunOutcome::Completed(answer)))
            }
            RunStatus::RequiresAction => self.handle_tool_calls(handle, &state.tool_calls).await,
            RunStatus::Failed => Ok(Tick::Ready(RunOutcome::Failed)),
            _ => Ok(Tick::Wait),
        }
    }

    async fn fetch_answer(&self, thread_id: &str) -> Result<String, EngineError> {
        let messages = self.service.list_messages(thread_id).await?;
        let raw = messages
            .first()
            .and_then(|message| message.text.first())
            .ok_or_else(|| EngineError::MissingAnswer { thread_id: thread_id.to_string() })?;

        debug!(thread_id, content = %raw, "Message content before cleaning");
        let cleaned = normalize_answer(raw);
        debug!(thread_id, content = %cleaned, "Message content after cleaning");
        Ok(cleaned)
    }

    async fn handle_tool_calls(
        &self,
        handle: &JobHandle,
        calls: &[ToolCallRequest],
    ) -> Result<Tick<RunOutcome>, EngineError> {
        info!(run_id = %handle.run_id, calls = calls.len(), "Run requires action, handling...");

        let results = match self.run_batch(calls).await {
            BatchOutcome::Ready(results) => results,
            BatchOutcome::Aborted => return Ok(Tick::Ready(RunOutcome::Failed)),
        };

        // Nothing to hand back; the run stays paused, so wait instead of spinning.
        if results.is_empty() {
            warn!(run_id = %handle.run_id, "No tool outputs produced for this batch");
            return Ok(Tick::Wait);
        }

        match self.service.submit_tool_outputs(handle, results).await {
            Ok(()) => Ok(Tick::Again),
            Err(JobServiceError::Unavailable(reason)) => {
                error!(run_id = %handle.run_id, %reason, "Tool output submission is unavailable");
                Ok(Tick::Ready(RunOutcome::Failed))
            }
            Err(e) => Err(e.into()),
        }
    }

    // Calls run one at a time, in request order.
    async fn run_batch(&self, calls: &[ToolCallRequest]) -> BatchOutcome {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            match dispatch(call, self.registry).await {
                Ok(Dispatch::Output(result)) => results.push(result),
                Ok(Dispatch::Skipped { .. }) => {}
                Err(e) => match self.options.on_tool_failure {
                    ToolFailurePolicy::Abort => {
                        error!(call_id = %call.call_id, "Tool execution failed: {}", e);
                        return BatchOutcome::Aborted;
                    }
                    ToolFailurePolicy::Degrade => {
                        warn!(call_id = %call.call_id, "Tool execution failed, submitting error output: {}", e);
                        let output = json!({ "status": "error", "message": e.to_string() });
                        results.push(ToolCallResult {
                            call_id: call.call_id.clone(),
                            output: output.to_string(),
                        });
                    }
                },
            }
        }

        BatchOutcome::Ready(results)
    }
}

/// Resolves a run on the wall clock.
pub async fn resolve(
    service: &dyn JobService,
    registry: &Registry,
    handle: &JobHandle,
    options: ResolveOptions,
) -> Result<RunOutcome, EngineError> {
    let clock = SystemClock::new();
    RunResolver::new(service, registry, &clock).with_options(options).resolve(handle).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_failure_policy() {
        assert_eq!("abort".parse::<ToolFailurePolicy>(), Ok(ToolFailurePolicy::Abort));
        assert_eq!(" Degrade ".parse::<ToolFailurePolicy>(), Ok(ToolFailurePolicy::Degrade));
        assert!("retry".parse::<ToolFailurePolicy>().is_err());
    }

    #[test]
    fn default_options_match_service_limits() {
        let options = ResolveOptions::default();
        assert_eq!(options.deadline, Duration::from_secs(15));
        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.on_tool_failure, ToolFailurePolicy::Abort);
    }
}
