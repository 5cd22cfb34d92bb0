//! Shared utilities

pub mod backoff;
pub mod logging;
