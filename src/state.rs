//! Persistent state values.
//!
//! Compound values live behind `Arc`, so cloning a [`State`] is cheap and a
//! transition only allocates along the path it touches. The engine uses
//! [`State::same`] (reference identity) to decide whether a node changed, and
//! `PartialEq` (deep equality) when restoring snapshots.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Insertion-ordered map backing [`State::Map`].
pub type StateMap = IndexMap<String, State>;

/// An immutable, structurally-shared JSON-like value.
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Arc<Vec<State>>),
    Map(Arc<StateMap>),
}

impl State {
    /// An empty map.
    pub fn map() -> Self {
        State::Map(Arc::new(StateMap::new()))
    }

    /// Build a map from key/value pairs, keeping their order.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, State)>,
        K: Into<String>,
    {
        State::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Reference identity.
    ///
    /// Scalars compare by value; lists and maps are the same only when they
    /// share an allocation. A reducer that returns its input untouched always
    /// yields a value that is `same` as the input.
    pub fn same(a: &State, b: &State) -> bool {
        match (a, b) {
            (State::Null, State::Null) => true,
            (State::Bool(x), State::Bool(y)) => x == y,
            (State::Number(x), State::Number(y)) => x == y,
            (State::String(x), State::String(y)) => Arc::ptr_eq(x, y) || x == y,
            (State::List(x), State::List(y)) => Arc::ptr_eq(x, y),
            (State::Map(x), State::Map(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, State::Null)
    }

    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            State::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[State]> {
        match self {
            State::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            State::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            State::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            State::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            State::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&State> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            State::Null => "null",
            State::Bool(_) => "bool",
            State::Number(_) => "number",
            State::String(_) => "string",
            State::List(_) => "list",
            State::Map(_) => "map",
        }
    }

    /// Copy-on-write insert.
    ///
    /// Non-map values are treated as an empty map. If `key` already holds a
    /// value that is [`same`](State::same) as `value`, `self` is returned
    /// unchanged.
    pub fn with(&self, key: impl Into<String>, value: State) -> State {
        let key = key.into();
        if let Some(current) = self.get(&key) {
            if State::same(current, &value) {
                return self.clone();
            }
        }
        let mut map = self.as_map().cloned().unwrap_or_default();
        map.insert(key, value);
        State::Map(Arc::new(map))
    }

    /// Shallow merge of `patch` over this value.
    ///
    /// Returns `self` (same reference) when no key actually changes.
    pub fn merge(&self, patch: &StateMap) -> State {
        let base = self.as_map();
        let changed = patch.iter().any(|(key, value)| {
            base.and_then(|map| map.get(key))
                .map_or(true, |current| !State::same(current, value))
        });
        if !changed && base.is_some() {
            return self.clone();
        }
        let mut map = base.cloned().unwrap_or_default();
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
        State::Map(Arc::new(map))
    }

    /// Convert to a plain `serde_json::Value`, preserving key order.
    pub fn to_json(&self) -> Value {
        match self {
            State::Null => Value::Null,
            State::Bool(b) => Value::Bool(*b),
            State::Number(n) => Value::Number(n.clone()),
            State::String(s) => Value::String(s.to_string()),
            State::List(items) => Value::Array(items.iter().map(State::to_json).collect()),
            State::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (State::List(x), State::List(y)) => Arc::ptr_eq(x, y) || x == y,
            (State::Map(x), State::Map(y)) => Arc::ptr_eq(x, y) || x == y,
            _ => State::same(self, other),
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<Value> for State {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => State::Null,
            Value::Bool(b) => State::Bool(b),
            Value::Number(n) => State::Number(n),
            Value::String(s) => State::String(s.into()),
            Value::Array(items) => {
                State::List(Arc::new(items.into_iter().map(State::from).collect()))
            }
            Value::Object(map) => State::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, State::from(v))).collect(),
            )),
        }
    }
}

impl From<&State> for Value {
    fn from(state: &State) -> Self {
        state.to_json()
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        State::Bool(value)
    }
}

impl From<i64> for State {
    fn from(value: i64) -> Self {
        State::Number(value.into())
    }
}

impl From<f64> for State {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(State::Null, State::Number)
    }
}

impl From<&str> for State {
    fn from(value: &str) -> Self {
        State::String(value.into())
    }
}

impl From<String> for State {
    fn from(value: String) -> Self {
        State::String(value.into())
    }
}

impl From<Vec<State>> for State {
    fn from(items: Vec<State>) -> Self {
        State::List(Arc::new(items))
    }
}

impl From<StateMap> for State {
    fn from(map: StateMap) -> Self {
        State::Map(Arc::new(map))
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            State::Null => serializer.serialize_unit(),
            State::Bool(b) => serializer.serialize_bool(*b),
            State::Number(n) => n.serialize(serializer),
            State::String(s) => serializer.serialize_str(s),
            State::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            State::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(State::from)
    }
}
