use thiserror::Error;

/// Raised while assembling the tool registry. Aborts the load.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool unit #{index} has an unparsable schema: {source}")]
    MalformedSchema {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool unit #{index} declares a callable with an empty name")]
    UnnamedFunction { index: usize },
}

/// Failure reported by the assistant/job service boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobServiceError {
    /// The transport itself could not be reached or is not available.
    #[error("job service unavailable: {0}")]
    Unavailable(String),
    /// The service answered but refused the request.
    #[error("job service rejected request: {0}")]
    Api(String),
}

/// Failure of a single tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("tool '{name}' returned a value that could not be serialized: {source}")]
    Serialization {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that escape `resolve` instead of becoming a `RunOutcome`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Service(#[from] JobServiceError),
    #[error("run completed on thread '{thread_id}' but no answer text was found")]
    MissingAnswer { thread_id: String },
}
