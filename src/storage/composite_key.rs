//! Composite key encoding for the ledger
//!
//! A composite key is laid out as `\0 namespace \0 seg1 \0 seg2 \0 ...`.
//! Every segment is terminated by the delimiter, so a prefix assembled from
//! whole segments can only match whole segments of a stored key.
//!
//! Segment values are rendered at a fixed width (20-digit zero-padded numbers,
//! 32-character right-aligned strings) so that byte order of the full key
//! follows the ordering of each field taken left to right.

use crate::core::{StoreError, StoreResult};

pub const COMPOSITE_DELIMITER: char = '\u{0}';

pub const NUMERIC_WIDTH: usize = 20;
pub const TEXT_WIDTH: usize = 32;

/// Render an unsigned number as a zero-padded, 20-digit segment.
pub fn format_numeric(value: u64) -> String {
    format!("{:0width$}", value, width = NUMERIC_WIDTH)
}

/// Render text right-aligned in a 32-character, space-padded segment.
///
/// Longer values are kept whole.
pub fn format_text(value: &str) -> String {
    format!("{:>width$}", value, width = TEXT_WIDTH)
}

fn check_segment(segment: &str) -> StoreResult<()> {
    if segment.contains(COMPOSITE_DELIMITER) {
        return Err(StoreError::MalformedKey(format!(
            "segment {:?} contains the composite key delimiter",
            segment
        )));
    }
    Ok(())
}

/// Build a composite key (or prefix) from a namespace and attribute segments.
pub fn create_composite_key<S: AsRef<str>>(namespace: &str, attributes: &[S]) -> StoreResult<String> {
    if namespace.is_empty() {
        return Err(StoreError::MalformedKey("namespace must not be empty".into()));
    }
    check_segment(namespace)?;

    let capacity = 2 + namespace.len() + attributes.iter().map(|a| a.as_ref().len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(COMPOSITE_DELIMITER);
    key.push_str(namespace);
    key.push(COMPOSITE_DELIMITER);
    for attribute in attributes {
        let attribute = attribute.as_ref();
        check_segment(attribute)?;
        key.push_str(attribute);
        key.push(COMPOSITE_DELIMITER);
    }
    Ok(key)
}

/// Split a composite key back into its namespace and segments.
pub fn split_composite_key(key: &str) -> StoreResult<(String, Vec<String>)> {
    let body = key
        .strip_prefix(COMPOSITE_DELIMITER)
        .and_then(|rest| rest.strip_suffix(COMPOSITE_DELIMITER))
        .ok_or_else(|| StoreError::MalformedKey(format!("{:?} is not a composite key", key)))?;

    let mut parts = body.split(COMPOSITE_DELIMITER).map(str::to_string);
    let namespace = parts
        .next()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| StoreError::MalformedKey(format!("{:?} has no namespace", key)))?;
    Ok((namespace, parts.collect()))
}

/// Encode a ledger key as an opaque, printable bookmark (lowercase hex).
pub fn encode_bookmark(key: &str) -> String {
    hex::encode(key)
}

/// Decode a bookmark produced by [`encode_bookmark`].
pub fn decode_bookmark(bookmark: &str) -> StoreResult<String> {
    let bytes = hex::decode(bookmark).map_err(|e| StoreError::InvalidBookmark(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StoreError::InvalidBookmark(e.to_string()))
}
