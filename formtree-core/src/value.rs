//! Model Values
//!
//! Values held by fields and produced by expression evaluation. Comparison is
//! structural, so a baseline captured with `clone()` is a deep copy that later
//! mutation of the live value cannot touch.
//!
//! Numbers are `f64`, which means a NaN anywhere inside a value makes it
//! unequal to itself. Fields start out holding NaN to mark "not yet set" and
//! change detection treats such values as unsettled rather than as data.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dynamically typed model value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// The value a freshly registered field holds before the host sets it.
    pub fn unset() -> Self {
        FieldValue::Number(f64::NAN)
    }

    /// True when the value is not equal to itself (contains NaN).
    #[allow(clippy::eq_op)]
    pub fn is_unsettled(&self) -> bool {
        self != self
    }

    /// Compare scalars by value and containers by length and keys only.
    pub fn shallow_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::List(a), FieldValue::List(b)) => a.len() == b.len(),
            (FieldValue::Map(a), FieldValue::Map(b)) => {
                a.len() == b.len() && a.keys().zip(b.keys()).all(|(x, y)| x == y)
            }
            (a, b) => a == b,
        }
    }

    /// Follow a dotted path (`person.address.city`) into nested maps.
    pub fn get_path(&self, path: &str) -> Option<&FieldValue> {
        path.split('.').try_fold(self, |value, segment| match value {
            FieldValue::Map(map) => map.get(segment),
            FieldValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Write `value` at a dotted path, creating intermediate maps as needed.
    ///
    /// Numeric segments index into lists the same way [`get_path`] reads
    /// them. Returns `false` when a segment lands on a scalar or past the end
    /// of a list.
    ///
    /// [`get_path`]: FieldValue::get_path
    pub fn set_path(&mut self, path: &str, value: FieldValue) -> bool {
        let mut segments = path.split('.').peekable();
        let mut current = self;

        while let Some(segment) = segments.next() {
            if matches!(current, FieldValue::Null) {
                *current = FieldValue::Map(IndexMap::new());
            }
            let last = segments.peek().is_none();
            let slot = match current {
                FieldValue::Map(map) => {
                    if last {
                        map.insert(segment.to_string(), value);
                        return true;
                    }
                    map.entry(segment.to_string()).or_insert(FieldValue::Null)
                }
                FieldValue::List(items) => {
                    let Some(slot) = segment
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| items.get_mut(index))
                    else {
                        return false;
                    };
                    slot
                }
                _ => return false,
            };
            if last {
                *slot = value;
                return true;
            }
            current = slot;
        }

        false
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}
