//! Scalar and JSON results of shell `--eval` invocations.

use crate::error::{ExtractError, Result};
use serde::de::DeserializeOwned;

/// Shell wrappers around numbers, e.g. `NumberLong(42)` or
/// `NumberLong("42")`.
const NUMBER_WRAPPERS: &[&str] = &["NumberLong", "NumberInt", "NumberDecimal"];

fn unwrap_number(value: &str) -> &str {
    NUMBER_WRAPPERS
        .iter()
        .find_map(|wrapper| {
            value
                .strip_prefix(wrapper)?
                .strip_prefix('(')?
                .strip_suffix(')')
        })
        .map_or(value, |inner| inner.trim_matches('"'))
}

/// Parse a one-line integer result. Blank output is `0`.
///
/// # Errors
///
/// [`ExtractError::Extraction`] if the trimmed output is not an integer.
pub fn parse_int(output: &str) -> Result<i64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    unwrap_number(trimmed)
        .parse()
        .map_err(|_| ExtractError::extraction("integer", format!("{trimmed:?}")))
}

/// Parse a JSON array of strings such as `getDBNames()` output.
///
/// # Errors
///
/// [`ExtractError::Json`] if the output is not such an array.
pub fn parse_string_list(output: &str) -> Result<Vec<String>> {
    parse_json(output)
}

/// Parse a JSON document into `T`.
///
/// # Errors
///
/// [`ExtractError::Json`] if the output does not deserialize.
pub fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T> {
    Ok(serde_json::from_str(output.trim())?)
}
