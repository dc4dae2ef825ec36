//! Reducers: pure `(state, action) -> state` functions.
//!
//! Reducers are composed rather than hand-written, see [`compose`]. A module
//! may also supply its own [`Reducer::new`] closure, and modules without
//! either get [`Reducer::identity`].

mod compose;

use std::fmt;
use std::sync::Arc;

use crate::action::{Action, ReduceError};
use crate::state::State;

pub use compose::{compose, ActionSpec, KindRule};

type ReduceFn =
    dyn Fn(Option<&State>, Option<&dyn Action>) -> Result<Option<State>, ReduceError> + Send + Sync;

/// Pure transition function bound to one node.
///
/// `state` is `None` until the node's first reduction. `action` is `None`
/// during the initialization pass, which is how initial state gets seeded.
#[derive(Clone)]
pub struct Reducer {
    inner: Arc<ReduceFn>,
}

impl Reducer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&State>, Option<&dyn Action>) -> Result<Option<State>, ReduceError>
            + Send
            + Sync
            + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Echo the state back untouched.
    pub fn identity() -> Self {
        Self::new(|state, _| Ok(state.cloned()))
    }

    pub fn reduce(
        &self,
        state: Option<&State>,
        action: Option<&dyn Action>,
    ) -> Result<Option<State>, ReduceError> {
        (self.inner)(state, action)
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Initialize;
    use serde_json::json;

    #[test]
    fn identity_echoes_state() {
        let state = State::from(json!({"x": 1}));
        let out = Reducer::identity()
            .reduce(Some(&state), Some(&Initialize::new(json!({}))))
            .unwrap()
            .unwrap();
        assert!(State::same(&state, &out));
    }

    #[test]
    fn identity_keeps_absent_state_absent() {
        assert!(Reducer::identity().reduce(None, None).unwrap().is_none());
    }
}
