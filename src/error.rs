//! Error types for dialog graph generation.

use crate::graph::ProcessingStatus;
use crate::types::NodeID;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Graph file storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid graph file {path}: {message}")]
    InvalidGraph { path: String, message: String },

    #[error("Duplicate node id in graph: {0}")]
    DuplicateNode(NodeID),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// API-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeID),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeID),

    #[error("Invalid status transition for node {node_id}: {from:?} cannot {event}")]
    InvalidTransition {
        node_id: NodeID,
        from: ProcessingStatus,
        event: &'static str,
    },

    #[error("A bulk regeneration run is already active")]
    RunInProgress,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out: {0}")]
    GenerationTimeout(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// Failure classification made once at the dispatch boundary.
///
/// `Timeout` marks a retryable backend time-limit condition; everything else is `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Failed,
}

impl FailureKind {
    /// Classify a raw backend message. Matches `timeout` or `timed out`, case-insensitive.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("timeout") || lowered.contains("timed out") {
            FailureKind::Timeout
        } else {
            FailureKind::Failed
        }
    }

    /// Terminal node status for this failure kind.
    pub fn status(self) -> ProcessingStatus {
        match self {
            FailureKind::Timeout => ProcessingStatus::Timeout,
            FailureKind::Failed => ProcessingStatus::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Failed => "error",
        }
    }
}

/// Error returned by the generation dispatcher, already classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchError {
    pub kind: FailureKind,
    pub message: String,
}

impl DispatchError {
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: FailureKind::classify(&message),
            message,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl From<ApiError> for DispatchError {
    /// Keeps the backend's own message; the variant prefix is not part of it.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::GenerationTimeout(message) => Self {
                kind: FailureKind::Timeout,
                message,
            },
            ApiError::GenerationFailed(message)
            | ApiError::ProviderError(message)
            | ApiError::ProviderNotConfigured(message)
            | ApiError::ProviderRequestFailed(message)
            | ApiError::ProviderAuthFailed(message)
            | ApiError::ProviderRateLimit(message)
            | ApiError::ProviderModelNotFound(message)
            | ApiError::ConfigError(message) => Self::from_message(message),
            other => Self::from_message(other.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err.kind {
            FailureKind::Timeout => ApiError::GenerationTimeout(err.message),
            FailureKind::Failed => ApiError::GenerationFailed(err.message),
        }
    }
}
