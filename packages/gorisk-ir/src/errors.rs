//! Error types for gorisk-ir
//!
//! Unified error handling across the crate. Errors never cross a
//! component boundary as a panic; every stage returns `Result<T>` and the
//! pipeline driver converts the deepest error to an exit code.

use thiserror::Error;

/// Main error type for gorisk operations.
#[derive(Debug, Error)]
pub enum GoriskError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest / lockfile loading error (fatal for the ecosystem)
    #[error("Loader error: {0}")]
    Loader(String),

    /// Source parse error (per-file; callers usually downgrade to a skip)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Analysis error
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Configuration error (bad options, invalid pattern table)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Policy file error
    #[error("Policy error: {0}")]
    Policy(String),

    /// External collaborator failure (subprocess, network)
    #[error("External error: {0}")]
    External(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GoriskError {
    pub fn loader(msg: impl Into<String>) -> Self {
        GoriskError::Loader(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        GoriskError::Parse(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        GoriskError::Analysis(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        GoriskError::Config(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        GoriskError::Policy(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        GoriskError::External(msg.into())
    }

    /// Invocation-class errors map to exit code 2; anything that survives
    /// to a rendered report does not change the exit code by itself.
    pub fn is_invocation(&self) -> bool {
        matches!(
            self,
            GoriskError::Loader(_) | GoriskError::Config(_) | GoriskError::Policy(_)
        )
    }
}

/// Result type alias for gorisk operations.
pub type Result<T> = std::result::Result<T, GoriskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = GoriskError::loader("no lockfile found");
        assert_eq!(err.to_string(), "Loader error: no lockfile found");
    }

    #[test]
    fn test_invocation_classification() {
        assert!(GoriskError::loader("x").is_invocation());
        assert!(GoriskError::config("x").is_invocation());
        assert!(!GoriskError::analysis("x").is_invocation());
    }

    #[test]
    fn test_io_conversion() {
        fn fails() -> Result<()> {
            std::fs::read_to_string("/definitely/not/here/gorisk")?;
            Ok(())
        }
        assert!(matches!(fails(), Err(GoriskError::Io(_))));
    }
}
