//! Error handling for the content filter
//!
//! Every failure the filter can hit while loading a model or scoring a
//! request is expressed as a [`FilterError`]. The HTTP layer only
//! distinguishes client input errors from everything else; see
//! [`crate::api_errors::AppError`].

use thiserror::Error;

/// Main error type for the content filter
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model load failed: {message}")]
    ModelLoad { message: String },

    #[error("Tokenization failed: {message}")]
    Tokenization { message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Explanation failed: {message}")]
    Explanation { message: String },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with FilterError
pub type FilterResult<T> = Result<T, FilterError>;

impl FilterError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a model load error
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad {
            message: message.into(),
        }
    }

    /// Create a tokenization error
    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::Tokenization {
            message: message.into(),
        }
    }

    /// Create an inference error
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Create an explanation error
    pub fn explanation(message: impl Into<String>) -> Self {
        Self::Explanation {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors caused by the caller rather than the filter
    pub fn is_client_error(&self) -> bool {
        matches!(self, FilterError::InvalidInput { .. })
    }
}

/// Convert from candle errors
impl From<candle_core::Error> for FilterError {
    fn from(err: candle_core::Error) -> Self {
        FilterError::inference(err.to_string())
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        FilterError::io("io_operation", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::internal(format!("JSON operation failed: {err}"))
    }
}
