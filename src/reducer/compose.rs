//! Builds a single reducer from a declarative action specification.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::action::{Action, ActionKind, ReduceError};
use crate::config::ConfigError;
use crate::state::{State, StateMap};

use super::Reducer;

type Handler = Arc<dyn Fn(&State, &dyn Action) -> Result<State, ReduceError> + Send + Sync>;

/// One entry of an [`ActionSpec::Kinds`] list.
///
/// Without a handler the matched action reduces itself.
#[derive(Clone)]
pub struct KindRule {
    kind: ActionKind,
    handler: Option<Handler>,
}

impl KindRule {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            handler: None,
        }
    }

    /// Match `kind` but run `handler` instead of the action's own `reduce`.
    pub fn with_handler<F>(kind: ActionKind, handler: F) -> Self
    where
        F: Fn(&State, &dyn Action) -> Result<State, ReduceError> + Send + Sync + 'static,
    {
        Self {
            kind,
            handler: Some(Arc::new(handler)),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    fn apply(&self, state: &State, action: &dyn Action) -> Result<State, ReduceError> {
        match &self.handler {
            Some(handler) => handler(state, action),
            None => action.reduce(state),
        }
    }
}

impl From<ActionKind> for KindRule {
    fn from(kind: ActionKind) -> Self {
        KindRule::new(kind)
    }
}

impl fmt::Debug for KindRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRule")
            .field("kind", &self.kind)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Declarative description of how a node reacts to actions.
#[derive(Debug, Clone)]
pub enum ActionSpec {
    /// Ordered kinds. The first kind the action answers to wins.
    Kinds(Vec<KindRule>),
    /// One sub-specification per state key.
    Keys(IndexMap<String, ActionSpec>),
}

impl ActionSpec {
    pub fn kinds<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<KindRule>,
    {
        ActionSpec::Kinds(rules.into_iter().map(Into::into).collect())
    }

    pub fn keys<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ActionSpec)>,
        K: Into<String>,
    {
        ActionSpec::Keys(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Compose `spec` into a reducer whose absent state defaults to `initial`.
///
/// Structural problems in the spec are reported here, never at dispatch time.
pub fn compose(spec: &ActionSpec, initial: Option<&State>) -> Result<Reducer, ConfigError> {
    let composed = Composed::build(spec, initial, &mut Vec::new())?;
    Ok(Reducer::new(move |state, action| {
        composed.apply(state, action).map(Some)
    }))
}

enum Composed {
    Kinds {
        rules: Vec<KindRule>,
        initial: State,
    },
    Keys {
        keys: IndexMap<String, Composed>,
        initial: State,
    },
}

impl Composed {
    fn build(
        spec: &ActionSpec,
        initial: Option<&State>,
        path: &mut Vec<String>,
    ) -> Result<Self, ConfigError> {
        let initial = initial.filter(|s| !s.is_null());
        match spec {
            ActionSpec::Kinds(rules) => {
                let mut seen = HashSet::new();
                for rule in rules {
                    if !seen.insert(rule.kind) {
                        return Err(malformed(
                            path,
                            format!("kind '{}' is declared more than once", rule.kind),
                        ));
                    }
                }
                Ok(Composed::Kinds {
                    rules: rules.clone(),
                    initial: initial.cloned().unwrap_or_else(State::map),
                })
            }
            ActionSpec::Keys(entries) => {
                if let Some(state) = initial {
                    if state.as_map().is_none() {
                        return Err(malformed(
                            path,
                            format!(
                                "keyed spec needs a map initial state, found {}",
                                state.type_name()
                            ),
                        ));
                    }
                }
                let mut keys = IndexMap::with_capacity(entries.len());
                for (key, sub) in entries {
                    path.push(key.clone());
                    let child_initial = initial.and_then(|s| s.get(key));
                    let composed = Composed::build(sub, child_initial, path);
                    path.pop();
                    keys.insert(key.clone(), composed?);
                }
                Ok(Composed::Keys {
                    keys,
                    initial: initial.cloned().unwrap_or_else(State::map),
                })
            }
        }
    }

    fn apply(&self, state: Option<&State>, action: Option<&dyn Action>) -> Result<State, ReduceError> {
        match self {
            Composed::Kinds { rules, initial } => {
                let state = state.filter(|s| !s.is_null()).unwrap_or(initial);
                let Some(action) = action else {
                    return Ok(state.clone());
                };
                match rules.iter().find(|rule| action.is_kind(rule.kind)) {
                    Some(rule) => rule.apply(state, action),
                    None => Ok(state.clone()),
                }
            }
            Composed::Keys { keys, initial } => {
                let state = state.filter(|s| !s.is_null()).unwrap_or(initial);
                let Some(entries) = state.as_map() else {
                    return Ok(state.clone());
                };
                // Walk the state's own keys; keys without a sub-spec pass through.
                let mut next: Option<StateMap> = None;
                for (key, value) in entries.iter() {
                    let Some(sub) = keys.get(key) else {
                        continue;
                    };
                    let reduced = sub.apply(Some(value), action)?;
                    if !State::same(&reduced, value) {
                        next.get_or_insert_with(|| entries.clone())
                            .insert(key.clone(), reduced);
                    }
                }
                Ok(next.map_or_else(|| state.clone(), State::from))
            }
        }
    }
}

fn malformed(path: &[String], reason: String) -> ConfigError {
    ConfigError::MalformedActionSpec {
        path: if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(".")
        },
        reason,
    }
}
