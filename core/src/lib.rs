//! Run resolution for assistant-service chats: tool registry, tool dispatch,
//! the bounded polling engine and answer cleanup.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod poll;
pub mod registry;
pub mod runtime;
pub mod sanitize;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Settings;
pub use dispatch::{dispatch, Dispatch, ToolArguments};
pub use error::{EngineError, JobServiceError, RegistryError, ToolError};
pub use llm::OpenAiJobService;
pub use registry::{Registry, Tool, ToolSchema, ToolUnit};
pub use runtime::{resolve, ResolveOptions, RunOutcome, RunResolver, ToolFailurePolicy};
pub use service::{
    JobHandle, JobService, RunState, RunStatus, ThreadMessage, ToolCallRequest, ToolCallResult,
};
