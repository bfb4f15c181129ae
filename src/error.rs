// ============================================================
// Crate Error Type
// ============================================================
// Errors raised by the library layers (domain, data, ml, infra).
// The application and CLI layers wrap these in anyhow::Error.
//
// Only configuration errors are fatal for a whole run. Per-item
// problems (alignment failures, truncated answers, unresolved page
// boundaries) never surface here; they become NoSpan labels or
// frozen page maps and are logged instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocQaError {
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("tokenizer failed while {context}: {message}")]
    Tokenizer {
        context: &'static str,
        message: String,
    },

    #[error("model failed while {context}: {message}")]
    Model {
        context: &'static str,
        message: String,
    },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error while {context}: {source}")]
    Yaml {
        context: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DocQaError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn tokenizer(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Tokenizer {
            context,
            message: err.to_string(),
        }
    }

    pub fn model(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Model {
            context,
            message: err.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn yaml(context: &'static str, source: serde_yaml::Error) -> Self {
        Self::Yaml { context, source }
    }
}

pub type Result<T> = std::result::Result<T, DocQaError>;
