use thiserror::Error;

/// Top-level error type for tubedigest.
///
/// Store failures are split by direction so callers can apply different
/// policies: a failed read degrades to a cache miss, a failed write after a
/// successful pipeline run only loses persistence.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store read failed: {0}")]
    StoreRead(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DigestError {
    /// True for failures of the underlying storage medium.
    pub fn is_store_error(&self) -> bool {
        matches!(self, DigestError::StoreRead(_) | DigestError::StoreWrite(_))
    }
}

impl From<toml::de::Error> for DigestError {
    fn from(err: toml::de::Error) -> Self {
        DigestError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DigestError {
    fn from(err: toml::ser::Error) -> Self {
        DigestError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DigestError {
    fn from(err: serde_json::Error) -> Self {
        DigestError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for tubedigest operations.
pub type Result<T> = std::result::Result<T, DigestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases: Vec<(DigestError, &str)> = vec![
            (
                DigestError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                DigestError::StoreRead("database is locked".to_string()),
                "Store read failed: database is locked",
            ),
            (
                DigestError::StoreWrite("disk full".to_string()),
                "Store write failed: disk full",
            ),
            (
                DigestError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DigestError = io_err.into();
        assert!(matches!(err, DigestError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: DigestError = err.unwrap_err().into();
        assert!(matches!(err, DigestError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: DigestError = err.unwrap_err().into();
        assert!(matches!(err, DigestError::Serialization(_)));
    }

    #[test]
    fn test_is_store_error() {
        assert!(DigestError::StoreRead("x".into()).is_store_error());
        assert!(DigestError::StoreWrite("x".into()).is_store_error());
        assert!(!DigestError::Config("x".into()).is_store_error());
    }
}
