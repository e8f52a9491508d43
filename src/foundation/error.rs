pub type LaminaResult<T> = Result<T, LaminaError>;

/// Errors raised while compositing, recording or replaying a page.
#[derive(thiserror::Error, Debug)]
pub enum LaminaError {
    /// A plane buffer, cache or log stream could not be allocated within its budget.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A record, stack or banding size invariant was violated.
    #[error("range error: {0}")]
    Range(String),

    /// Nesting was unbalanced or an operation arrived in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A group declared a colorant count the blend engine cannot handle.
    #[error("unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LaminaError {
    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::OutOfMemory(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn unsupported_color_space(msg: impl Into<String>) -> Self {
        Self::UnsupportedColorSpace(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Only allocation failures are retried by the low-memory recovery protocol.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

impl From<serde_json::Error> for LaminaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
