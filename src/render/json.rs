use serde::Serialize;

use crate::error::AptSearchError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, AptSearchError> {
    Ok(serde_json::to_string_pretty(value)?)
}
