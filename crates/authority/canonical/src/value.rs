use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::EncodingError;

/// Digits kept after the decimal point when encoding floats.
pub const FLOAT_DECIMALS: usize = 6;

/// Largest float magnitude accepted (2^53). Beyond it fixed-precision
/// output stops being meaningful.
pub const FLOAT_BOUND: f64 = 9_007_199_254_740_992.0;

/// A finite, bounded float with `-0` normalized to `0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiniteFloat(f64);

impl FiniteFloat {
    pub fn new(value: f64) -> Result<Self, EncodingError> {
        if !value.is_finite() {
            return Err(EncodingError::NonFiniteFloat(value));
        }
        if value.abs() >= FLOAT_BOUND {
            return Err(EncodingError::FloatOutOfRange(value));
        }
        // -0.0 == 0.0, so this also folds the negative zero.
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    fn encode(self) -> String {
        let mut text = format!("{:.*}", FLOAT_DECIMALS, self.0);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        // Values that round away entirely (e.g. -0.0000001) print as "-0".
        if text == "-0" {
            text = "0".to_string();
        }
        text
    }
}

/// The closed set of values the canonicalizer accepts.
///
/// Maps are `BTreeMap<String, _>`, so iteration is already in byte order of
/// the keys regardless of insertion order.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(FiniteFloat),
    String(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    pub fn float(value: f64) -> Result<Self, EncodingError> {
        FiniteFloat::new(value).map(Self::Float)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonicalValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Convert a parsed JSON value.
    ///
    /// Integers outside `i64` are rejected rather than silently widened to a
    /// float.
    pub fn from_json(value: &Value) -> Result<Self, EncodingError> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if n.is_u64() {
                    return Err(EncodingError::IntegerOutOfRange(n.to_string()));
                } else {
                    match n.as_f64() {
                        Some(f) => Self::float(f)?,
                        None => return Err(EncodingError::IntegerOutOfRange(n.to_string())),
                    }
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(fields) => Self::Map(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_json(v)?)))
                    .collect::<Result<BTreeMap<_, _>, EncodingError>>()?,
            ),
        })
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.extend_from_slice(b"null"),
            Self::Bool(true) => out.extend_from_slice(b"true"),
            Self::Bool(false) => out.extend_from_slice(b"false"),
            Self::Int(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Self::Float(f) => out.extend_from_slice(f.encode().as_bytes()),
            Self::String(s) => write_string(s, out),
            Self::List(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    item.write_into(out);
                }
                out.push(b']');
            }
            Self::Map(fields) => {
                out.push(b'{');
                for (i, (key, item)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    write_string(key, out);
                    out.push(b':');
                    item.write_into(out);
                }
                out.push(b'}');
            }
        }
    }
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Canonical bytes of a value. Pure and total.
pub fn canonical_bytes(value: &CanonicalValue) -> Vec<u8> {
    let mut out = Vec::new();
    value.write_into(&mut out);
    out
}

/// Lift any serializable value into the canonical domain.
///
/// serde_json renders non-finite floats as `null`, so kernel types never
/// carry `f64` fields; floats enter only through [`CanonicalValue::float`]
/// or parsed JSON, both of which reject them.
pub fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Result<CanonicalValue, EncodingError> {
    let json = serde_json::to_value(value)?;
    CanonicalValue::from_json(&json)
}

/// Canonical bytes of any serializable value.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    Ok(canonical_bytes(&to_canonical(value)?))
}
