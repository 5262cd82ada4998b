use std::{
    fmt::Formatter,
    hash::{Hash, Hasher},
};

use serde_json::Value;

/// A single spreadsheet cell.
///
/// The Sheets API hands back untyped JSON; everything past the adapter works
/// with this closed set instead.
#[derive(Debug, Clone, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

pub type CellGrid = Vec<Vec<CellValue>>;

impl CellValue {
    pub fn text<S: Into<String>>(value: S) -> Self {
        CellValue::Text(value.into())
    }

    /// `Empty` and the empty string are both blank.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.is_empty(),
            CellValue::Number(_) | CellValue::Bool(_) => false,
        }
    }

    /// Text view of the cell. Blank cells read as `""`; numbers and booleans
    /// are not text and yield `None`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Empty => Some(""),
            CellValue::Text(text) => Some(text.as_str()),
            CellValue::Number(_) | CellValue::Bool(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Text(_) => "text",
            CellValue::Number(_) => "number",
            CellValue::Bool(_) => "boolean",
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => a.to_bits() == b.to_bits(),
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Empty => {}
            CellValue::Text(text) => text.hash(state),
            CellValue::Number(number) => number.to_bits().hash(state),
            CellValue::Bool(flag) => flag.hash(state),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Number(number) if number.fract() == 0.0 && number.is_finite() => {
                write!(f, "{}", *number as i64)
            }
            CellValue::Number(number) => write!(f, "{}", number),
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
        }
    }
}

/// Conversions: Others -> CellValue

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::String(text) => CellValue::Text(text),
            Value::Bool(flag) => CellValue::Bool(flag),
            Value::Number(number) => match number.as_f64() {
                Some(number) => CellValue::Number(number),
                None => CellValue::Text(number.to_string()),
            },
            other @ (Value::Array(_) | Value::Object(_)) => CellValue::Text(other.to_string()),
        }
    }
}

/// Conversions: CellValue -> Others

impl From<CellValue> for Value {
    fn from(cell: CellValue) -> Self {
        match cell {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Text(text) => Value::String(text),
            CellValue::Bool(flag) => Value::Bool(flag),
            CellValue::Number(number)
                if number.fract() == 0.0 && number.abs() < i64::MAX as f64 =>
            {
                Value::from(number as i64)
            }
            CellValue::Number(number) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(number.to_string())),
        }
    }
}
