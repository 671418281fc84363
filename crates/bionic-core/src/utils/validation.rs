//! Validation Utilities

use thiserror::Error;

/// Validation error types
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Field required: {0}")]
    Required(String),
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::InvalidInput(err.to_string())
    }
}

/// Validate a requesting user id.
///
/// User ids are opaque, but must be non-blank and short enough to sit in
/// store metadata filters.
pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::Required("user_id cannot be empty".into()));
    }
    if user_id.len() > 256 {
        return Err(ValidationError::InvalidId(
            "user_id must be 256 bytes or less".into(),
        ));
    }
    Ok(())
}

/// Validate a cleanup job id
///
/// Valid ids are:
/// - 1-64 characters
/// - Lowercase alphanumeric with hyphens and underscores
/// - Must start with a letter
pub fn validate_job_id(id: &str) -> Result<(), ValidationError> {
    let Some(first) = id.chars().next() else {
        return Err(ValidationError::Required("job id cannot be empty".into()));
    };

    if id.len() > 64 {
        return Err(ValidationError::InvalidId(
            "job id must be 64 characters or less".into(),
        ));
    }

    if !first.is_ascii_lowercase() {
        return Err(ValidationError::InvalidId(
            "job id must start with a lowercase letter".into(),
        ));
    }

    for (i, c) in id.chars().enumerate() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            return Err(ValidationError::InvalidId(format!(
                "Invalid character '{}' at position {}",
                c, i
            )));
        }
    }

    Ok(())
}
