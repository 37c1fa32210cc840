//! Property values exchanged with the host, and the formats that type them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Typed value of a property.
///
/// Mappers and HTTP bodies only deal with strings; this is the representation
/// handed to (and received from) the host after format coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Parse a loosely typed literal, as typed on a command line.
    pub fn parse_literal(input: &str) -> Self {
        let trimmed = input.trim();
        if let Ok(b) = trimmed.parse::<bool>() {
            return Self::Boolean(b);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Self::Float(f);
        }
        Self::String(input.to_string())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Declared format of a property, as found in the host props.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyFormat {
    Bool,
    Int,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    #[default]
    String,
    /// Any format the engine does not coerce (data, tlv8, ...)
    Other(String),
}

impl PropertyFormat {
    /// Whether values of this format are parsed as integers.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64
        )
    }

    /// Turn a raw mapped string into a typed value.
    ///
    /// Integer formats take the leading number of the input (`"3.7"` gives 3),
    /// `float` takes the leading decimal number. Anything that does not parse
    /// is kept as a string.
    pub fn coerce(&self, raw: &str) -> PropertyValue {
        if self.is_integer() {
            if let Some(i) = leading_integer(raw) {
                return PropertyValue::Integer(i);
            }
            warn!("Cannot read '{}' as an integer, keeping the raw string", raw);
        } else if *self == Self::Float {
            if let Some(f) = leading_float(raw) {
                return PropertyValue::Float(f);
            }
            warn!("Cannot read '{}' as a float, keeping the raw string", raw);
        }
        PropertyValue::String(raw.to_string())
    }
}

impl From<String> for PropertyFormat {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float" => Self::Float,
            "string" => Self::String,
            _ => Self::Other(s),
        }
    }
}

impl From<PropertyFormat> for String {
    fn from(format: PropertyFormat) -> Self {
        match format {
            PropertyFormat::Bool => "bool".to_string(),
            PropertyFormat::Int => "int".to_string(),
            PropertyFormat::Uint8 => "uint8".to_string(),
            PropertyFormat::Uint16 => "uint16".to_string(),
            PropertyFormat::Uint32 => "uint32".to_string(),
            PropertyFormat::Uint64 => "uint64".to_string(),
            PropertyFormat::Float => "float".to_string(),
            PropertyFormat::String => "string".to_string(),
            PropertyFormat::Other(s) => s,
        }
    }
}

fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().ok()
}

fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    // Shrink until the prefix parses, e.g. "21.5e" -> "21.5"
    (1..=end)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok())
        .filter(|f| f.is_finite())
}
