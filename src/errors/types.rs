//! Error type definitions for the direct transfer engine
//!
//! This module defines all error types used throughout the engine,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level engine error type
///
/// This enum represents all possible errors that can occur in the engine.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Store layer errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Extraction errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Pipeline stage errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Job scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Illegal status transition on a migration, entity, or tracker
    #[error("Invalid status transition: {record} cannot move from {from} to {to}")]
    InvalidTransition {
        record: String,
        from: String,
        to: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Extraction boundary errors
///
/// The retryable/fatal split is the contract between the extractor and the
/// pipeline runner: retryable errors are retried with backoff at the same
/// cursor, fatal errors mark the tracker failed immediately.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Transient failure, safe to retry at the same cursor
    #[error("Retryable extract failure: {message}")]
    Retryable { message: String },

    /// Permanent failure, must not be retried blindly
    #[error("Fatal extract failure: {message}")]
    Fatal { message: String },
}

impl ExtractError {
    /// Create a retryable error with a custom message
    pub fn retryable<S: Into<String>>(message: S) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    /// Create a fatal error with a custom message
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Whether the pipeline runner may retry this error at the same cursor
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Classify an HTTP client error by transience
    ///
    /// Timeouts, connection errors and 5xx responses are retryable;
    /// everything else (4xx, decode failures, redirect loops) is permanent.
    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return Self::Retryable {
                message: err.to_string(),
            };
        }

        if let Some(status) = err.status() {
            if status.is_server_error() {
                return Self::Retryable {
                    message: format!("server returned {status}"),
                };
            }
        }

        Self::Fatal {
            message: err.to_string(),
        }
    }
}

/// Errors raised inside one pipeline stage by the transform or load step
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Record did not match the shape the transformer expects
    #[error("Transform failed for {pipeline}: {message}")]
    TransformFailed { pipeline: String, message: String },

    /// Destination-side write failed
    #[error("Load failed for {pipeline}: {message}")]
    LoadFailed { pipeline: String, message: String },

    /// Extraction failed inside the stage loop
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Store access failed while persisting progress
    #[error("Store access failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Create a transform failure
    pub fn transform<P: Into<String>, M: Into<String>>(pipeline: P, message: M) -> Self {
        Self::TransformFailed {
            pipeline: pipeline.into(),
            message: message.into(),
        }
    }

    /// Create a load failure
    pub fn load<P: Into<String>, M: Into<String>>(pipeline: P, message: M) -> Self {
        Self::LoadFailed {
            pipeline: pipeline.into(),
            message: message.into(),
        }
    }

    /// Short class name recorded on entity failures for diagnostics
    pub fn class(&self) -> &'static str {
        match self {
            Self::TransformFailed { .. } => "TransformFailed",
            Self::LoadFailed { .. } => "LoadFailed",
            Self::Extract(ExtractError::Retryable { .. }) => "RetriesExhausted",
            Self::Extract(ExtractError::Fatal { .. }) => "ExtractFailed",
            Self::Store(_) => "StoreFailed",
        }
    }
}

/// Persistence boundary errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found
    #[error("Record not found: {record} with id {id}")]
    RecordNotFound { record: String, id: String },

    /// Unique constraint violated (one tracker per entity/pipeline pair)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Backend failure from whatever persistence layer is plugged in
    #[error("Store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: ToString>(record: R, id: I) -> Self {
        Self::RecordNotFound {
            record: record.into(),
            id: id.to_string(),
        }
    }
}

/// Errors that can occur in the job scheduling system
#[derive(Error, Debug)]
pub enum SchedulingError {
    /// Job already exists in the queue
    #[error("Job with key '{key}' already exists in queue")]
    DuplicateJob { key: String },

    /// Invalid job configuration
    #[error("Invalid job configuration: {reason}")]
    InvalidJob { reason: String },
}

impl TransferError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_classification() {
        assert!(ExtractError::retryable("timeout").is_retryable());
        assert!(!ExtractError::fatal("bad scheme").is_retryable());
    }

    #[test]
    fn test_pipeline_error_class_names() {
        let transform = PipelineError::transform("members", "missing username");
        let load = PipelineError::load("labels", "destination rejected record");
        let fatal = PipelineError::Extract(ExtractError::fatal("404"));

        assert_eq!(transform.class(), "TransformFailed");
        assert_eq!(load.class(), "LoadFailed");
        assert_eq!(fatal.class(), "ExtractFailed");
    }
}
