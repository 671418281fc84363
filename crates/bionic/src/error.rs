//! Error types for bionic.

use thiserror::Error;

/// Errors the CLI reports itself, as opposed to engine errors it passes through.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unknown cooling profile: {0}. Run `bionic profiles` to list them")]
    UnknownProfile(String),

    #[error("{0} must be a finite, non-negative number")]
    InvalidNumber(&'static str),

    #[error("Cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CliError::UnknownProfile("weeks_2".into()).to_string(),
            "Unknown cooling profile: weeks_2. Run `bionic profiles` to list them"
        );
        assert_eq!(
            CliError::InvalidNumber("--elapsed").to_string(),
            "--elapsed must be a finite, non-negative number"
        );
    }
}
