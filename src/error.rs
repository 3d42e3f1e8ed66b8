use thiserror::Error;

/// Request-fatal failures. Everything else in the pipeline is absorbed into
/// batch results and the run log.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("loader: {0}")]
    Loader(#[source] anyhow::Error),

    #[error("planner: {0}")]
    Planner(String),

    #[error("serializer: {0}")]
    Serializer(#[source] anyhow::Error),
}

impl EngineError {
    /// Whether this failure should flip the error flag on the progress record.
    pub fn is_catastrophic(&self) -> bool {
        !matches!(self, EngineError::Validation(_))
    }
}

/// Failure modes of the remote completion client.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport hiccups, rate limits, 5xx responses. Worth another attempt.
    #[error("retriable: {0}")]
    Retriable(String),

    /// Bad credentials, unknown model, permanent rejections. Retrying is
    /// pointless; the batch fails immediately.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl LlmError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, LlmError::Retriable(_))
    }
}
