/// Result alias used across the crate.
pub type TilecompResult<T> = Result<T, TilecompError>;

/// Errors surfaced at build/validation boundaries.
///
/// Pixel computation never produces these; faults inside a chunk are caught and logged.
#[derive(thiserror::Error, Debug)]
pub enum TilecompError {
    /// Invalid configuration or node description.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation-graph structure problem (cycle, dangling id, bad socket).
    #[error("graph error: {0}")]
    Graph(String),

    /// Execution could not start or failed in strict mode.
    #[error("execution error: {0}")]
    Execution(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Eviction scratch storage failure.
    #[error("scratch storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TilecompError {
    /// Build a [`TilecompError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TilecompError::Graph`].
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Build a [`TilecompError::Execution`].
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Build a [`TilecompError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
