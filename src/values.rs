//! Attribute values. Element markers and annotations carry small bags of
//! typed values; keeping them in an ordered map gives us cheap structural
//! equality, which the attribute-change and branch-conversion constructors
//! lean on.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use smartstring::alias::String as SmartString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An attribute value. Deliberately small: the linear model only ever stores
/// scalars and flat lists (heading levels, list styles, reference keys).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(SmartString),
    List(Vec<Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Attributes on an element marker or annotation.
pub type AttrMap = BTreeMap<SmartString, Value>;

/// A requested set of attribute edits: `None` removes the key.
pub type AttrChanges = BTreeMap<SmartString, Option<Value>>;

/// Build an [`AttrMap`] from key/value pairs.
pub fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> AttrMap {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// True if every requested attribute already holds the requested value.
/// Asymmetric on purpose: keys absent from `wanted` are not compared.
pub fn attrs_match(wanted: &AttrMap, actual: &AttrMap) -> bool {
    wanted.iter().all(|(k, v)| actual.get(k) == Some(v))
}
