//! Lossy coercion of provider fields into non-negative integers.
//!
//! A result of 0 is ambiguous: it is either a real zero or an invalid value.

/// Parses a field that should hold a non-negative integer.
///
/// Only strings made purely of ASCII digits after trimming are accepted.
/// Missing, empty, signed, decimal, alphabetic and out-of-range values map to 0.
pub fn to_non_negative_int(value: Option<&str>) -> u64 {
    let Some(raw) = value else {
        return 0;
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }

    trimmed.parse::<u64>().unwrap_or(0)
}
