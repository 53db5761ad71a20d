//! Cache key encoding.
//!
//! A cache key is `<table>@<primary_key>`. Primary keys may contain `@`
//! themselves, so decoding strips exactly one `<table>@` prefix and keeps the
//! whole remainder.

/// Joins table name and primary key.
pub const SEPARATOR: char = '@';

/// Builds the cache key of a primary key within `table`.
pub fn construct_cache_key(table: &str, primary_key: &str) -> String {
    format!("{}{}{}", table, SEPARATOR, primary_key)
}

/// Recovers the primary key from a cache key built for `table`.
///
/// Returns `None` when the cache key does not belong to `table`.
pub fn extract_primary_key<'a>(table: &str, cache_key: &'a str) -> Option<&'a str> {
    cache_key
        .strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
}
