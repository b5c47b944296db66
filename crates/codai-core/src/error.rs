//! Error types for Codai Core
//!
//! Logical not-found conditions are never errors here: stores answer them
//! with `Option`/`bool`, and unknown feature flags evaluate as disabled.
//! What remains is caller-supplied data with the wrong shape
//! ([`ValidationError`]) and configuration/IO failures.

use thiserror::Error;

/// Result type alias for Codai operations
pub type Result<T> = std::result::Result<T, CodaiError>;

/// Main error type for Codai operations
#[derive(Error, Debug)]
pub enum CodaiError {
    /// Caller-supplied data failed shape validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<CodaiError>,
    },
}

/// Shape violations in records, patches, filters and flag definitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} must be in range [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ValidationError {
    /// Reject an empty or whitespace-only string field
    pub fn require_text(field: &'static str, value: &str) -> std::result::Result<(), Self> {
        if value.trim().is_empty() {
            Err(Self::MissingField(field))
        } else {
            Ok(())
        }
    }

    /// Reject a number outside `[min, max]` (NaN is always rejected)
    pub fn require_range(
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    ) -> std::result::Result<(), Self> {
        if value.is_nan() || value < min || value > max {
            Err(Self::OutOfRange {
                field,
                value,
                min,
                max,
            })
        } else {
            Ok(())
        }
    }
}

impl CodaiError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The validation failure at the root of this error, if any
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            Self::WithContext { source, .. } => source.as_validation(),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CodaiError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
