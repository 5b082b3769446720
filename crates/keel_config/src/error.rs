//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `keel.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required value is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("configuration-cache.dir".to_string());
        assert_eq!(format!("{err}"), "missing required field: configuration-cache.dir");
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("max-problems must be at least 1".to_string());
        assert_eq!(
            format!("{err}"),
            "validation error: max-problems must be at least 1"
        );
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
