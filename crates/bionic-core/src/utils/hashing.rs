//! Hashing Utilities

/// Compute the deterministic record id for a user's content.
///
/// The id is the MD5 hex digest of `"{user_id}::{content}"`, with the user id
/// hashed exactly as it is stored on the record. Identical text from the same
/// user always lands on one record; identical text from different users never
/// collides.
pub fn memory_id(user_id: &str, content: &str) -> String {
    let key = format!("{}::{}", user_id, content);
    format!("{:x}", md5::compute(key.as_bytes()))
}
