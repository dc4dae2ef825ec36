//! Actions: immutable requests to transition state.
//!
//! Every action carries an explicit [`ActionKind`] tag. Reducers composed from
//! an [`ActionSpec`](crate::reducer::ActionSpec) match on that tag, never on
//! the concrete Rust type.

mod builtin;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::state::State;

pub use builtin::{Assign, Initialize};

/// Kind tag carried by every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKind(&'static str);

impl ActionKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Errors raised while reducing a single action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReduceError {
    #[error("expected a map, found {found}")]
    NotAMap { found: &'static str },

    #[error("field '{field}' is missing or has the wrong type")]
    InvalidField { field: String },

    #[error("{message}")]
    Rejected { message: String },

    #[error("reducer returned no state for a node that had one")]
    StateCleared,
}

/// An immutable request to transition state.
///
/// `reduce` must be pure: same input, same output, no side effects. It must
/// not dispatch.
pub trait Action: Send + Sync + 'static {
    /// The kind tag this action was created as.
    fn kind(&self) -> ActionKind;

    /// Whether this action answers to `kind`.
    ///
    /// Defaults to tag equality. Override it to make an action a refinement
    /// of another kind; composed reducers take the first declared kind the
    /// action answers to.
    fn is_kind(&self, kind: ActionKind) -> bool {
        self.kind() == kind
    }

    /// Debug label sent to the inspector.
    fn label(&self) -> String {
        self.kind().name().to_string()
    }

    /// Compute the next state from `state`.
    fn reduce(&self, state: &State) -> Result<State, ReduceError>;
}

/// Actions are shared so the inspector history can retain them for replay.
pub type SharedAction = Arc<dyn Action>;

impl fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind())
            .field("label", &self.label())
            .finish()
    }
}
