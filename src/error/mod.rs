use std::path::PathBuf;

use thiserror::Error;

use crate::message::MessageRecord;
use crate::transport::TransportError;

/// Failure while turning a template source into a compiled entry.
///
/// Cloneable so every caller coalesced onto the same in-flight compile
/// receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("template engine error: {0}")]
    Engine(String),

    #[error("markdown conversion failed: {0}")]
    Markdown(String),
}

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Failed to compile template {name}: {source}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
    },

    /// CSS inlining failed. The record carries the HTML as it was before
    /// inlining so callers can still inspect what would have been sent.
    #[error("Failed to inline CSS: {reason}")]
    Inline {
        reason: String,
        record: Box<MessageRecord>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to discover templates in {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template rendering failed: {0}")]
    Render(String),

    #[error("Composer has been destroyed")]
    Destroyed,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ComposeError {
    /// Short machine-readable code, used as a metrics/log label.
    pub fn code(&self) -> &'static str {
        match self {
            ComposeError::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            ComposeError::Compile { .. } => "COMPILE_FAILURE",
            ComposeError::Inline { .. } => "INLINE_FAILURE",
            ComposeError::Transport(_) => "TRANSPORT_FAILURE",
            ComposeError::Discovery { .. } => "DISCOVERY_FAILURE",
            ComposeError::Render(_) => "RENDER_FAILURE",
            ComposeError::Destroyed => "DESTROYED",
            ComposeError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The partially built record, when the failure happened late enough
    /// in the pipeline to have one.
    pub fn record(&self) -> Option<&MessageRecord> {
        match self {
            ComposeError::Inline { record, .. } => Some(record),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_template_message_names_template() {
        let err = ComposeError::UnknownTemplate("ghost".to_string());
        assert_eq!(err.to_string(), "Unknown template: ghost");
        assert_eq!(err.code(), "UNKNOWN_TEMPLATE");
    }

    #[test]
    fn test_compile_error_is_source() {
        let err = ComposeError::Compile {
            name: "welcome".to_string(),
            source: CompileError::Markdown("boom".to_string()),
        };
        assert!(err.to_string().contains("welcome"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.record().is_none());
    }
}
