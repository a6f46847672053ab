use crate::TtsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Short machine-readable code for tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "NOT_FOUND",
            ToolError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            ToolError::ExecutionFailed(_) => "EXECUTION_FAILED",
            ToolError::Timeout => "TIMEOUT",
            ToolError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<TtsError> for ToolError {
    fn from(e: TtsError) -> Self {
        match e {
            TtsError::Validation(msg) => ToolError::InvalidArguments(msg),
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SynthesisError;

    #[test]
    fn test_tts_error_mapping() {
        let e: ToolError = TtsError::Validation("bad speed".into()).into();
        assert!(matches!(e, ToolError::InvalidArguments(ref m) if m == "bad speed"));

        let e: ToolError = TtsError::from(SynthesisError::classify("quota")).into();
        assert!(matches!(e, ToolError::ExecutionFailed(ref m) if m.contains("quota")));
        assert_eq!(e.code(), "EXECUTION_FAILED");
    }
}
