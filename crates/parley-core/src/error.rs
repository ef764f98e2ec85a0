use thiserror::Error;

/// A convenience `Result` alias using [`ParleyError`].
pub type ParleyResult<T> = Result<T, ParleyError>;

/// Top-level error type for Parley.
///
/// Only the variants that abort a user turn ever reach the caller of the
/// runner. Malformed frames, bad tool arguments, unknown tools and failing
/// tools are recovered where they happen and only show up in logs or as
/// textual tool results.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Network or connection failure, non-success HTTP status, or an error
    /// payload sent by the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend kept requesting tools past the configured bound.
    #[error("Tool loop exceeded maximum of {max_round_trips} round trips")]
    ToolLoopExceeded {
        /// The configured bound that was hit.
        max_round_trips: u32,
        /// Assistant content finalized before the bound was hit.
        partial_content: String,
    },

    /// The backend asked for a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool failed while executing.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// An append would break the conversation's role or tool-linkage rules.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The request was cancelled before the turn finished.
    #[error("Request cancelled")]
    Cancelled,

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Whether the error ends the current user turn.
    ///
    /// `UnknownTool` and `ToolExecution` are recovered by the runner and
    /// never abort a turn.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ParleyError::UnknownTool(_) | ParleyError::ToolExecution(_)
        )
    }
}
