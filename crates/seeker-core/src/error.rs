//! Error types for Threat-Seeker core
//!
//! - Plan construction invariants
//! - Critique payload parsing
//! - Configuration loading and validation

/// Plan invariant violations
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Hypothesis text is blank
    #[error("hypothesis must not be empty")]
    EmptyHypothesis,

    /// Two queries share an ID
    #[error("duplicate query id: {0}")]
    DuplicateQueryId(String),
}

/// Critique merge errors
#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    /// Critique payload cannot be parsed into the expected shape
    #[error("malformed critique: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for CritiqueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Create invalid-value error
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
