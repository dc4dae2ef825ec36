//! Helper actions for common tasks.

use crate::state::State;

use super::{Action, ActionKind, ReduceError};

/// Shallow-merges a partial map into the current state.
#[derive(Debug, Clone)]
pub struct Assign {
    patch: State,
    label: String,
}

impl Assign {
    pub const KIND: ActionKind = ActionKind::new("[canopy] Assign");

    pub fn new(patch: impl Into<State>) -> Self {
        let patch = patch.into();
        let label = format!("{} {}", Self::KIND, patch);
        Self { patch, label }
    }

    pub fn patch(&self) -> &State {
        &self.patch
    }
}

impl Action for Assign {
    fn kind(&self) -> ActionKind {
        Self::KIND
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        let patch = self.patch.as_map().ok_or(ReduceError::NotAMap {
            found: self.patch.type_name(),
        })?;
        Ok(state.merge(patch))
    }
}

/// Replaces the state unconditionally.
#[derive(Debug, Clone)]
pub struct Initialize {
    state: State,
}

impl Initialize {
    pub const KIND: ActionKind = ActionKind::new("[canopy] Initialize");

    pub fn new(state: impl Into<State>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

impl Action for Initialize {
    fn kind(&self) -> ActionKind {
        Self::KIND
    }

    fn reduce(&self, _state: &State) -> Result<State, ReduceError> {
        Ok(self.state.clone())
    }
}
