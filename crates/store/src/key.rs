use std::fmt;

use serde_json::Value;

/// Ordered key used for primary keys and secondary index values.
///
/// Variant order defines the sort order across types: booleans, then
/// integers, then strings. Booleans are only valid as index values.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Key {
    /// Convert a JSON scalar into a key. Objects, arrays, null and
    /// non-integral numbers have no key form.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Key::Int),
            Value::String(s) => Some(Key::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(n) => Value::from(*n),
            Key::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn is_valid_primary(&self) -> bool {
        !matches!(self, Key::Bool(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(i64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Int(i64::from(n))
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Str(s.clone())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

/// Resolve a dotted key path (`address.country`) inside a record.
pub(crate) fn lookup<'a>(record: &'a Value, key_path: &str) -> Option<&'a Value> {
    key_path.split('.').try_fold(record, |current, segment| current.get(segment))
}

/// Write `value` at a dotted key path, creating intermediate objects.
/// Returns `false` when a non-object sits in the way.
pub(crate) fn assign(record: &mut Value, key_path: &str, value: Value) -> bool {
    let Some(map) = record.as_object_mut() else { return false };
    match key_path.split_once('.') {
        None => {
            map.insert(key_path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            assign(child, rest, value)
        }
    }
}
