use thiserror::Error;

/// Configuration and data errors raised while building a layer.
///
/// Numeric degeneracy is never reported here: stats degrade to partial output
/// instead of failing the chart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid parameter '{param}': {message}")]
    Validation { param: String, message: String },

    #[error("Unknown stat '{0}'")]
    UnknownStat(String),

    #[error("Column '{column}' mapped to '{aesthetic}' not found")]
    ColumnNotFound { aesthetic: String, column: String },

    #[error("Data error: {0}")]
    Data(String),
}

impl PipelineError {
    pub fn validation(param: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Name of the offending parameter, for validation errors.
    pub fn param(&self) -> Option<&str> {
        match self {
            PipelineError::Validation { param, .. } => Some(param),
            PipelineError::UnknownStat(_) => Some("stat"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
