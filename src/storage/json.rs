//! Best-effort JSON decoding.
//!
//! Stored values and metadata are opaque text written by callers. When a
//! reader asks for JSON and the text does not parse, the field reads as
//! absent. These helpers are the only place that policy lives.

use serde::de::DeserializeOwned;
use tracing::trace;

/// Parses `raw` as JSON, or returns `None` if it is malformed.
pub fn decode_or_absent<T: DeserializeOwned>(raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            trace!(error = %e, len = raw.len(), "Treating malformed JSON as absent");
            None
        }
    }
}

/// Same as [`decode_or_absent`] for a nullable column.
///
/// A JSON `null` also reads as absent.
pub fn decode_column(raw: Option<&str>) -> Option<serde_json::Value> {
    raw.and_then(decode_or_absent::<serde_json::Value>)
        .filter(|value| !value.is_null())
}
