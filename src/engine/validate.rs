//! Path segment validation.
//!
//! Table names and primary keys become path components in the file engine,
//! so each must be exactly one harmless segment.

use crate::error::{Result, StoreError};

/// Checks that `segment` cannot escape its parent directory.
///
/// Rejects empty segments, path separators (`/`, `\`), NUL bytes and any
/// segment starting with `.` (which covers `.` and `..`).
pub fn validate_segment(segment: &str) -> Result<()> {
    let is_traversal = segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(['/', '\\', '\0']);

    if is_traversal {
        return Err(StoreError::path_traversal());
    }
    Ok(())
}

/// Validates every segment, failing on the first bad one.
pub fn validate_segments(segments: &[&str]) -> Result<()> {
    segments.iter().try_for_each(|segment| validate_segment(segment))
}
