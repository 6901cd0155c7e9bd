use std::fmt;

use serde::{Serialize, Serializer};

use crate::value::Value;

/// An attachment key: the property name, sequence index or map key under which a
/// child is reachable from a parent. Event paths are lists of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
    MapKey(Value),
}

impl PathStep {
    /// Normalises a numeric property name (`"3"`, `"+3"`) to a sequence index.
    pub fn to_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(i) => Some(*i),
            PathStep::Key(name) => parse_index(name),
            PathStep::MapKey(Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => {
                Some(*n as usize)
            }
            PathStep::MapKey(Value::String(s)) => parse_index(s),
            PathStep::MapKey(_) => None,
        }
    }

    pub(crate) fn normalized_for_sequence(self) -> PathStep {
        match self.to_index() {
            Some(i) => PathStep::Index(i),
            None => self,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathStep::Key(name) => Some(name),
            _ => None,
        }
    }

    /// The step as a value, as handed to map operations.
    pub fn to_value(&self) -> Value {
        match self {
            PathStep::Key(name) => Value::String(name.clone()),
            PathStep::Index(i) => Value::from(*i),
            PathStep::MapKey(key) => key.clone(),
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    let (negative, digits) = match name.as_bytes().first() {
        Some(b'+') => (false, &name[1..]),
        Some(b'-') => (true, &name[1..]),
        _ => (false, name),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse::<usize>().ok()?;
    if negative && index != 0 {
        return None;
    }
    Some(index)
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(name) => f.write_str(name),
            PathStep::Index(i) => write!(f, "{i}"),
            PathStep::MapKey(key) => f.write_str(&key.to_display_string()),
        }
    }
}

impl Serialize for PathStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathStep::Key(name) => serializer.serialize_str(name),
            PathStep::Index(i) => serializer.serialize_u64(*i as u64),
            PathStep::MapKey(key) => key.serialize(serializer),
        }
    }
}

impl From<&str> for PathStep {
    fn from(name: &str) -> Self {
        PathStep::Key(name.to_string())
    }
}

impl From<String> for PathStep {
    fn from(name: String) -> Self {
        PathStep::Key(name)
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index)
    }
}

impl From<&PathStep> for PathStep {
    fn from(step: &PathStep) -> Self {
        step.clone()
    }
}
