//! Centralized error handling for the direct transfer engine
//!
//! This module provides a layered error system that mirrors the recovery
//! scopes of the engine: a page, then a pipeline, then an entity, then the
//! migration. Errors are classified at the extraction boundary as retryable
//! or fatal, and that classification drives the pipeline runner's retry and
//! failure-recording behaviour.
//!
//! # Error Categories
//!
//! - **Extract Errors**: remote query failures, split into retryable
//!   (timeouts, 5xx) and fatal (4xx, schema violations, disallowed scheme)
//! - **Pipeline Errors**: transform/load failures inside one stage
//! - **Store Errors**: persistence boundary failures
//! - **Scheduling Errors**: job queue misuse
//!
//! # Usage
//!
//! ```rust
//! use direct_transfer::errors::{TransferError, TransferResult};
//!
//! fn example_function() -> TransferResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using TransferError
pub type TransferResult<T> = Result<T, TransferError>;

/// Convenience type alias for extraction Results
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Convenience type alias for pipeline stage Results
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Convenience type alias for store Results
pub type StoreResult<T> = Result<T, StoreError>;
