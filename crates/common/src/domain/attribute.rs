use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failures of the typed attribute codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported value type: {0}")]
    UnsupportedType(&'static str),

    #[error("unknown attribute type tag: {0:?}")]
    UnknownTag(String),

    #[error("cannot decode {text:?} as {attribute_type}: {reason}")]
    Decode {
        attribute_type: AttributeType,
        text: String,
        reason: String,
    },
}

/// Discriminator stored next to every attribute value.
///
/// The one-character tag is the persisted form and fully determines how the
/// stored text is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Boolean,
    Integer,
    Float,
    String,
}

impl AttributeType {
    pub const fn tag(self) -> char {
        match self {
            AttributeType::Boolean => 'b',
            AttributeType::Integer => 'i',
            AttributeType::Float => 'f',
            AttributeType::String => 's',
        }
    }

    pub fn from_tag(tag: char) -> Result<Self, CodecError> {
        match tag {
            'b' => Ok(AttributeType::Boolean),
            'i' => Ok(AttributeType::Integer),
            'f' => Ok(AttributeType::Float),
            's' => Ok(AttributeType::String),
            other => Err(CodecError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for AttributeType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(tag), None) => Self::from_tag(tag),
            _ => Err(CodecError::UnknownTag(s.to_string())),
        }
    }
}

/// A scalar statistic value with its type made explicit
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Classify an untyped JSON value.
    ///
    /// Booleans are checked before numbers, and numbers that fit an `i64` are
    /// integers before anything is treated as a float. Only numbers written
    /// with a fraction or exponent are floats, so integer text outside the
    /// `i64` range is rejected instead of losing precision. `null`, arrays and
    /// objects have no encoding either.
    pub fn classify(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(AttributeValue::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(AttributeValue::Integer(i))
                } else if n.is_f64() {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .map(AttributeValue::Float)
                        .ok_or(CodecError::UnsupportedType("number out of range"))
                } else {
                    Err(CodecError::UnsupportedType("integer out of range"))
                }
            }
            Value::String(s) => Ok(AttributeValue::String(s.clone())),
            Value::Null => Err(CodecError::UnsupportedType("null")),
            Value::Array(_) => Err(CodecError::UnsupportedType("array")),
            Value::Object(_) => Err(CodecError::UnsupportedType("object")),
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Boolean(_) => AttributeType::Boolean,
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::String(_) => AttributeType::String,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Boolean(b) => Value::Bool(b),
            AttributeValue::Integer(i) => Value::from(i),
            AttributeValue::Float(f) => Value::from(f),
            AttributeValue::String(s) => Value::String(s),
        }
    }
}

/// Encode a value into its tag and canonical text
pub fn encode(value: &AttributeValue) -> (AttributeType, String) {
    let text = match value {
        AttributeValue::Boolean(b) => String::from(if *b { "1" } else { "0" }),
        AttributeValue::Integer(i) => i.to_string(),
        // Debug keeps a fractional part or exponent so the text never reads as an integer
        AttributeValue::Float(f) => format!("{:?}", f),
        AttributeValue::String(s) => s.clone(),
    };
    (value.attribute_type(), text)
}

/// Decode stored text according to its tag
pub fn decode(attribute_type: AttributeType, text: &str) -> Result<AttributeValue, CodecError> {
    let fail = |reason: String| CodecError::Decode {
        attribute_type,
        text: text.to_string(),
        reason,
    };

    match attribute_type {
        AttributeType::Boolean => text
            .parse::<i64>()
            .map(|n| AttributeValue::Boolean(n != 0))
            .map_err(|e| fail(e.to_string())),
        AttributeType::Integer => text
            .parse::<i64>()
            .map(AttributeValue::Integer)
            .map_err(|e| fail(e.to_string())),
        AttributeType::Float => text
            .parse::<f64>()
            .map(AttributeValue::Float)
            .map_err(|e| fail(e.to_string())),
        AttributeType::String => Ok(AttributeValue::String(text.to_string())),
    }
}
