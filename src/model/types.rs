//! Attribute and document value types.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date format the index accepts. The offset is not applied: a timestamp is
/// written as its wall-clock time in whatever zone the entity carried.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A value read from an entity attribute or method.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<Value>),
}

impl Value {
    /// Everything except `Null` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Null, empty string and empty list carry nothing worth indexing.
    /// `false` is a real value and is kept.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Flattens into document scalars, dropping blanks and formatting dates.
    pub fn into_scalars(self) -> Vec<Scalar> {
        let mut out = Vec::new();
        self.push_scalars(&mut out);
        out
    }

    fn push_scalars(self, out: &mut Vec<Scalar>) {
        if self.is_blank() {
            return;
        }
        match self {
            Value::List(items) => {
                for item in items {
                    item.push_scalars(out);
                }
            }
            Value::Bool(b) => out.push(Scalar::Bool(b)),
            Value::Int(i) => out.push(Scalar::Int(i)),
            Value::Float(f) => out.push(Scalar::Float(f)),
            Value::Str(s) => out.push(Scalar::Str(s)),
            Value::Date(d) => out.push(Scalar::Str(format_date(d))),
            Value::Timestamp(ts) => out.push(Scalar::Str(format_timestamp(&ts))),
            Value::Null => {}
        }
    }
}

pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.naive_local().format(DATE_FORMAT).to_string()
}

pub fn format_date(d: NaiveDate) -> String {
    NaiveDateTime::new(d, NaiveTime::MIN).format(DATE_FORMAT).to_string()
}

/// Parses the index date format back into a naive timestamp.
pub fn parse_index_date(s: &str) -> Option<NaiveDateTime> {
    if s.len() != 20 {
        return None;
    }
    NaiveDateTime::parse_from_str(s, DATE_FORMAT).ok()
}

/// Liberal date parsing for request parameters: RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// the index format itself, or a bare `YYYY-MM-DD`.
pub fn parse_loose_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", DATE_FORMAT] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Local>> for Value {
    fn from(v: DateTime<Local>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// One indexed value inside a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}
