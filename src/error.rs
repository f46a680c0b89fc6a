use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::workflow::Phase;

/// Client-side validation failures. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Please upload a valid PDF file.")]
    InvalidType { media_type: String },

    #[error("File size exceeds 50MB limit.")]
    TooLarge { size: u64 },

    #[error("Cannot read '{}': {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
}

/// Failures of a call to the summarization service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{status}: {}", .detail.as_deref().unwrap_or("no detail provided"))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unable to read '{}': {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("'{url}' cannot be used as an API base URL")]
    BaseUrl { url: url::Url },
}

impl ApiError {
    /// The explanation the service sent along with a failed response, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// One line for the user, preferring the server explanation over `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or(fallback).to_string()
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },

    #[error("No uploaded document to summarize")]
    NoFileId,

    #[error("{message}")]
    Upload {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("{message}")]
    Summarize {
        message: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("Failed to write '{}': {source}", .path.display())]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<arboard::Error> for PresentError {
    fn from(error: arboard::Error) -> Self {
        PresentError::Clipboard(error.to_string())
    }
}
