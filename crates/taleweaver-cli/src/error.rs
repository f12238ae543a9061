//! Taleweaver CLI error types.

use taleweaver_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the CLI.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A story generation or traversal operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Reading from or writing to the terminal failed.
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),

    /// The tracing or OpenTelemetry pipeline could not be set up or flushed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleweaver_core::ids::StoryId;

    #[test]
    fn test_domain_error_message_is_passed_through() {
        let err = AppError::from(DomainError::StoryNotFound(StoryId::from("9")));

        assert_eq!(err.to_string(), "story not found: 9");
    }

    #[test]
    fn test_config_error_names_the_problem() {
        let err = AppError::Config("TALEWEAVER_API_URL must not be empty".to_owned());

        assert_eq!(
            err.to_string(),
            "configuration error: TALEWEAVER_API_URL must not be empty"
        );
    }
}
