use serde_json::Value;
use thiserror::Error;

/// One decoded telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: String,
    pub value: Value,
}

impl Sample {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Record is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record has no '{0}' field")]
    MissingField(&'static str),

    #[error("Record key must be a non-empty string")]
    BadKey,
}

/// Decodes one line (without its terminator) into a [`Sample`].
///
/// The line must hold a single JSON object with a non-empty string `key` and
/// a `value` of any JSON type.
pub fn decode_record(line: &[u8]) -> Result<Sample, DecodeError> {
    let text = std::str::from_utf8(line)?;

    decode_text(text)
}

pub fn decode_text(text: &str) -> Result<Sample, DecodeError> {
    let Value::Object(mut obj) = serde_json::from_str::<Value>(text)? else {
        return Err(DecodeError::NotAnObject);
    };

    let key = match obj.remove("key") {
        Some(Value::String(key)) if !key.is_empty() => key,
        Some(_) => return Err(DecodeError::BadKey),
        None => return Err(DecodeError::MissingField("key")),
    };

    let value = obj
        .remove("value")
        .ok_or(DecodeError::MissingField("value"))?;

    Ok(Sample { key, value })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Expected an array of {expected} numbers")]
    NotAnArray { expected: usize },

    #[error("Expected {expected} elements, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Element {index} is not a finite number")]
    NotANumber { index: usize },
}

/// Interprets a sample value as a fixed-size array of finite floats.
pub fn value_to_array<const N: usize>(value: &Value) -> Result<[f64; N], ShapeError> {
    let arr = value
        .as_array()
        .ok_or(ShapeError::NotAnArray { expected: N })?;

    if arr.len() != N {
        return Err(ShapeError::WrongLength {
            expected: N,
            actual: arr.len(),
        });
    }

    let mut out = [0f64; N];
    for (index, (slot, elem)) in out.iter_mut().zip(arr).enumerate() {
        *slot = elem
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or(ShapeError::NotANumber { index })?;
    }

    Ok(out)
}
