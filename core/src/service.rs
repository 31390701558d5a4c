//! Boundary to the remote assistant service that executes runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::JobServiceError;

/// Identifies one run on one thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub thread_id: String,
    pub run_id: String,
}

impl JobHandle {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self { thread_id: thread_id.into(), run_id: run_id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

/// A tool invocation requested by a paused run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub function_name: String,
    /// Untrusted JSON text produced by the model.
    pub raw_arguments: String,
}

/// Serialized tool output, correlated to its request by `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub output: String,
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub status: RunStatus,
    /// Populated only while `status` is `RequiresAction`.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl RunState {
    pub fn new(status: RunStatus) -> Self {
        Self { status, tool_calls: Vec::new() }
    }

    pub fn requires_action(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self { status: RunStatus::RequiresAction, tool_calls }
    }
}

/// One thread message, reduced to its text segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadMessage {
    pub id: String,
    pub text: Vec<String>,
}

#[async_trait]
pub trait JobService: Send + Sync {
    async fn create_thread(&self) -> Result<String, JobServiceError>;

    /// Appends a user turn to the thread and returns the message id.
    async fn add_user_message(&self, thread_id: &str, text: &str)
        -> Result<String, JobServiceError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str)
        -> Result<String, JobServiceError>;

    async fn get_run_status(&self, handle: &JobHandle) -> Result<RunState, JobServiceError>;

    /// Messages on the thread, most recent first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, JobServiceError>;

    async fn submit_tool_outputs(
        &self,
        handle: &JobHandle,
        results: Vec<ToolCallResult>,
    ) -> Result<(), JobServiceError>;
}
