//! Parts payload hashing and parsing.
//!
//! Elevations carry an opaque JSON payload describing their part rows.
//! The payload is hashed at reconcile time for change detection, then
//! parsed through the elevation's parse lifecycle. Parsing is best-effort
//! per row: a payload with some invalid rows yields a `Partial` result,
//! a structurally wrong payload yields `ValidationFailed`.

use catmirror_model::{Elevation, ParseState};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing::warn;

/// Glass pane dimensions attached to a part row.
#[derive(Debug, Clone, PartialEq)]
pub struct GlassSpec {
    /// Pane width in millimetres.
    pub width_mm: f64,
    /// Pane height in millimetres.
    pub height_mm: f64,
    /// Glass build-up description (e.g. "4/16/4"), if reported.
    pub structure: Option<String>,
}

/// One parsed part row.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    /// Article number.
    pub article: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Piece count, at least 1.
    pub quantity: u64,
    /// Glass spec when the part is a pane.
    pub glass: Option<GlassSpec>,
}

impl PartRecord {
    /// Returns true if the part is a glass pane.
    pub fn is_glass(&self) -> bool {
        self.glass.is_some()
    }
}

/// Result of parsing one payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessedParts {
    /// Rows that parsed.
    pub parts: Vec<PartRecord>,
    /// Rows that did not.
    pub failed_rows: u64,
    /// Detail of the first row failure.
    pub first_error: Option<String>,
}

impl ProcessedParts {
    /// Returns the terminal parse state this result maps to.
    pub fn final_state(&self) -> ParseState {
        if self.failed_rows == 0 {
            ParseState::Success
        } else {
            ParseState::Partial
        }
    }
}

/// Hashes a parts payload for change detection. `None` payloads hash to
/// `None`, so presence and absence always compare as different.
pub fn content_hash(payload: Option<&Value>) -> Option<String> {
    let payload = payload?;
    // serde_json::Value serialization is infallible for tree values.
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    Some(hex)
}

/// Parses a payload into part rows.
///
/// `None` means the remote attached no payload; that parses trivially.
/// A payload that is not a JSON array is a validation failure, returned
/// as `Err` with detail.
pub fn process(payload: Option<&Value>) -> Result<ProcessedParts, String> {
    let Some(payload) = payload else {
        return Ok(ProcessedParts::default());
    };
    let rows = payload
        .as_array()
        .ok_or_else(|| format!("parts payload is not an array (got {})", kind(payload)))?;

    let mut result = ProcessedParts::default();
    for (index, row) in rows.iter().enumerate() {
        match parse_row(row) {
            Ok(part) => result.parts.push(part),
            Err(detail) => {
                result.failed_rows += 1;
                if result.first_error.is_none() {
                    result.first_error = Some(format!("row {index}: {detail}"));
                }
            }
        }
    }
    Ok(result)
}

/// Runs the full parse lifecycle for one elevation against its payload.
///
/// Transitions the row to `InProgress` and then a terminal state,
/// recording error detail. A structurally rejected payload lands in
/// `ValidationFailed` without touching the retry counter: retrying the
/// same bytes cannot succeed, so the counter is reserved for attempts
/// lost to an interrupted run. The caller persists the row afterwards.
pub fn apply(elevation: &mut Elevation, payload: Option<&Value>) -> ProcessedParts {
    elevation.parse_state = ParseState::InProgress;
    match process(payload) {
        Ok(result) => {
            elevation.parse_state = result.final_state();
            elevation.last_parse_error = result.first_error.clone();
            if result.failed_rows > 0 {
                warn!(
                    elevation = %elevation.remote_id,
                    failed_rows = result.failed_rows,
                    "parts payload parsed partially"
                );
            }
            result
        }
        Err(detail) => {
            elevation.parse_state = ParseState::ValidationFailed;
            elevation.last_parse_error = Some(detail.clone());
            warn!(elevation = %elevation.remote_id, error = %detail, "parts payload rejected");
            ProcessedParts {
                parts: Vec::new(),
                failed_rows: 0,
                first_error: Some(detail),
            }
        }
    }
}

fn parse_row(row: &Value) -> Result<PartRecord, String> {
    let object = row
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", kind(row)))?;

    let article = object
        .get("article")
        .and_then(Value::as_str)
        .filter(|a| !a.trim().is_empty())
        .ok_or("missing or empty article")?
        .to_string();

    let quantity = match object.get("quantity") {
        None => 1,
        Some(value) => value
            .as_u64()
            .filter(|&q| q > 0)
            .ok_or_else(|| format!("invalid quantity {value}"))?,
    };

    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let glass = match object.get("glass") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_glass(value)?),
    };

    Ok(PartRecord {
        article,
        description,
        quantity,
        glass,
    })
}

fn parse_glass(value: &Value) -> Result<GlassSpec, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("glass spec is not an object (got {})", kind(value)))?;

    let dimension = |key: &str| -> Result<f64, String> {
        object
            .get(key)
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| format!("missing or non-positive glass {key}"))
    };

    Ok(GlassSpec {
        width_mm: dimension("width_mm")?,
        height_mm: dimension("height_mm")?,
        structure: object
            .get("structure")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
