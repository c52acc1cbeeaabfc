//! Unified error types for the LDAR simulator.
//!
//! This module provides a common error type [`LdarError`] that can represent
//! errors from any part of the system. Domain-specific failures (parameter
//! validation, weather-grid lookups, sensor construction, cache handling)
//! are converted to `LdarError` for uniform handling at API boundaries.

use thiserror::Error;

/// Unified error type for all simulator operations.
///
/// Variants map to the failure classes the system distinguishes: parameter
/// errors are fatal at start-up, grid errors are fatal at simulation init,
/// cache staleness is recoverable by regeneration, and a subsimulation
/// failure is recorded per-program by the orchestrator.
#[derive(Error, Debug)]
pub enum LdarError {
    /// I/O errors (file access, directory creation, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required key, type mismatch, or unknown parameter level
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Site coordinate falls outside the weather grid
    #[error("site '{site}' is outside the weather grid: {detail}")]
    GridOutOfRange { site: String, detail: String },

    /// Work window of zero or more than 24 hours; callers fall back to the
    /// configured maximum workday
    #[error("infeasible work schedule: {0}")]
    ScheduleInfeasible(String),

    /// MDL missing or wrong shape for the configured sensor
    #[error("sensor configuration for method '{method}': {detail}")]
    SensorConfig { method: String, detail: String },

    /// Pre-generated world cache does not match current inputs
    #[error("world cache is stale: {0}")]
    WorldCacheStale(String),

    /// Uncaught failure inside a simulation worker
    #[error("simulation of program '{program}' failed: {detail}")]
    Subsimulation { program: String, detail: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using LdarError.
pub type LdarResult<T> = Result<T, LdarError>;

impl From<anyhow::Error> for LdarError {
    fn from(err: anyhow::Error) -> Self {
        LdarError::Other(err.to_string())
    }
}

impl From<String> for LdarError {
    fn from(s: String) -> Self {
        LdarError::Other(s)
    }
}

impl From<&str> for LdarError {
    fn from(s: &str) -> Self {
        LdarError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for LdarError {
    fn from(err: serde_json::Error) -> Self {
        LdarError::Parameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LdarError::GridOutOfRange {
            site: "F001".into(),
            detail: "latitude 62.1 above grid maximum 60.0".into(),
        };
        assert!(err.to_string().contains("F001"));
        assert!(err.to_string().contains("weather grid"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LdarError = io_err.into();
        assert!(matches!(err, LdarError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> LdarResult<()> {
            Err(LdarError::Parameter("missing key 'LPR'".into()))
        }

        fn outer() -> LdarResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
