//! Values carried by streams and host calls.
//!
//! A `Value` is what a host passes into a dispatch adapter, what transforms
//! fold over, and what scalar host properties and call results are made of.
//! It serializes as plain JSON (`null`, `true`, `3`, `"click"`, RFC 3339
//! timestamps).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically typed value.
///
/// ```
/// use hookstream::Value;
///
/// let count = Value::Int(3);
/// assert_eq!(count.as_int(), Some(3));
/// assert_eq!(Value::from("click").as_str(), Some("click"));
/// assert!(Value::default().is_null());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value yet (a fresh stream) or an explicit null from a host.
    #[default]
    Null,
    Bool(bool),
    /// Counters, timer handles and virtual-clock milliseconds.
    Int(i64),
    /// Wall-clock time, as delivered by the threaded timer host.
    Timestamp(DateTime<Utc>),
    String(String),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp(_))
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        if let Self::Int(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Self::String(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Timestamp(at) => f.write_str(&at.to_rfc3339()),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Self::Bool(v),
    i32 => |v| Self::Int(i64::from(v)),
    i64 => |v| Self::Int(v),
    String => |v| Self::String(v),
    &str => |v| Self::String(v.to_string()),
    DateTime<Utc> => |v| Self::Timestamp(v),
}
