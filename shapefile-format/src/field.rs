//! Attribute field values and their decoders

use std::fmt;

use chrono::NaiveDate;
use serde_json::Value;

use crate::charset::CharacterDecoder;
use crate::constants::DBF_DATE_FORMAT;
use crate::error::{Result, ShapefileError};

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `C` field text, trimmed
    Character(String),
    /// `N` field
    Numeric(f64),
    /// `F` field
    FloatingPoint(f64),
    /// `D` field; `None` when the stored date is blank
    Date(Option<NaiveDate>),
}

impl FieldValue {
    /// Convert to a JSON value. Dates become `YYYY-MM-DD` strings.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Character(s) => Value::String(s.clone()),
            FieldValue::Numeric(n) | FieldValue::FloatingPoint(n) => {
                serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            FieldValue::Date(Some(date)) => Value::String(date.format("%Y-%m-%d").to_string()),
            FieldValue::Date(None) => Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Character(s) => f.write_str(s),
            FieldValue::Numeric(n) | FieldValue::FloatingPoint(n) => write!(f, "{}", n),
            FieldValue::Date(Some(date)) => write!(f, "{}", date.format(DBF_DATE_FORMAT)),
            FieldValue::Date(None) => Ok(()),
        }
    }
}

/// A named attribute value from one record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    value: FieldValue,
}

impl Field {
    /// Pair a name with a value.
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Field name from the descriptor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Compare against the string form used by filters.
    ///
    /// Text compares exactly, numbers compare after parsing `other` as a
    /// float, and dates compare after parsing `other` as `MM/DD/YYYY`.
    pub fn matches(&self, other: &str) -> bool {
        match &self.value {
            FieldValue::Character(s) => s == other,
            FieldValue::Numeric(n) | FieldValue::FloatingPoint(n) => {
                other.trim().parse::<f64>().map(|v| v == *n).unwrap_or(false)
            }
            FieldValue::Date(Some(date)) => NaiveDate::parse_from_str(other.trim(), DBF_DATE_FORMAT)
                .map(|d| d == *date)
                .unwrap_or(false),
            FieldValue::Date(None) => false,
        }
    }
}

/// Decode a `C` field.
pub fn decode_character(buf: &[u8], decoder: &CharacterDecoder) -> Result<FieldValue> {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = decoder.decode(&buf[..end])?;
    Ok(FieldValue::Character(text.trim().to_string()))
}

/// Decode an `N` field.
pub fn decode_numeric(buf: &[u8]) -> Result<FieldValue> {
    parse_number(buf).map(FieldValue::Numeric)
}

/// Decode an `F` field.
pub fn decode_floating_point(buf: &[u8]) -> Result<FieldValue> {
    parse_number(buf).map(FieldValue::FloatingPoint)
}

/// Decode a `D` field.
pub fn decode_date(buf: &[u8]) -> Result<FieldValue> {
    let text = String::from_utf8_lossy(buf);
    let text = text.trim_matches(|c| c == '\0' || c == ' ');
    if text.is_empty() {
        return Ok(FieldValue::Date(None));
    }

    NaiveDate::parse_from_str(text, DBF_DATE_FORMAT)
        .map(|date| FieldValue::Date(Some(date)))
        .map_err(|_| ShapefileError::InvalidDate(text.to_string()))
}

fn parse_number(buf: &[u8]) -> Result<f64> {
    let text = String::from_utf8_lossy(buf);
    let text = text.trim_matches(' ');
    text.parse::<f64>()
        .map_err(|_| ShapefileError::InvalidNumber(text.to_string()))
}
