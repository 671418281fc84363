//! Shared utilities.

mod hashing;
mod time;
mod validation;

pub use hashing::memory_id;
pub use time::{format_datetime, now_utc, parse_datetime};
pub use validation::{validate_job_id, validate_user_id, ValidationError};
