use exn::ResultExt;

use crate::error::{ErrorKind, Result};

/// Encode a string list column (a JSON array of strings).
pub(crate) fn encode(values: &[String], field: &'static str) -> Result<String> {
    serde_json::to_string(values).or_raise(|| ErrorKind::InvalidData(field))
}

/// Decode a string list column. Rows written without a list hold `null`.
pub(crate) fn decode(raw: &str, field: &'static str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let values: Option<Vec<String>> = serde_json::from_str(raw).or_raise(|| ErrorKind::InvalidData(field))?;
    Ok(values.unwrap_or_default())
}
