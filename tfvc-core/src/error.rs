use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest stderr excerpt carried on a `ToolFailure`.
pub const MAX_STDERR_EXCERPT: usize = 4_000;

/// Machine readable classification of a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum FaultKind {
    AuthExpired,
    ToolNotFound,
    EulaNotAccepted,
    ParseFailure,
    NonZeroExit,
}

#[derive(Error, Debug)]
pub enum TfvcError {
    #[error("Failed to launch '{}': {source}", program.display())]
    LaunchFailure {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tf failed ({kind}, exit code {exit_code:?}): {stderr}")]
    ToolFailure {
        kind: FaultKind,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    #[error("Settings error: {0}")]
    Settings(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TfvcError>;

impl TfvcError {
    pub fn tool_failure(kind: FaultKind, exit_code: Option<i32>, stderr: &str) -> Self {
        Self::ToolFailure {
            kind,
            exit_code,
            stderr: excerpt(stderr),
        }
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ToolFailure {
            kind: FaultKind::ParseFailure,
            exit_code: None,
            stderr: message.into(),
        }
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::ToolFailure { kind, .. } => Some(*kind),
            Self::NotAuthorized(_) => Some(FaultKind::AuthExpired),
            Self::LaunchFailure { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Some(FaultKind::ToolNotFound)
            }
            _ => None,
        }
    }

    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }
}

impl From<tokio::task::JoinError> for TfvcError {
    fn from(source: tokio::task::JoinError) -> Self {
        if source.is_cancelled() {
            Self::Interrupted("background task was cancelled".to_string())
        } else {
            Self::Interrupted(format!("background task panicked: {source}"))
        }
    }
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let mut end = MAX_STDERR_EXCERPT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
