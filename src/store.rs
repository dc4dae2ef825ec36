//! Per-node read/write handle.
//!
//! A [`Store`] reads one node's state and forwards actions to the
//! [`StateManager`]. It never reduces anything itself: every dispatch goes
//! through the manager so parents, siblings and children can react to the
//! same action.

use std::sync::Arc;

use thiserror::Error;

use crate::action::{Action, ActionKind, SharedAction};
use crate::config::ModuleId;
use crate::engine::{DispatchError, DispatchReport, StateManager, Subscription};
use crate::state::State;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Module '{module}' is not part of the state tree")]
    UnknownModule { module: ModuleId },

    #[error("Module '{module}' does not accept actions of kind '{kind}'")]
    Unauthorized { module: ModuleId, kind: ActionKind },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Handle bound to one module's node.
#[derive(Clone)]
pub struct Store {
    manager: StateManager,
    module: ModuleId,
    node: usize,
    accepts: Option<Arc<[ActionKind]>>,
}

impl Store {
    /// Bind a handle to `module`.
    ///
    /// The module must be part of the tree; nodes are never created on demand.
    pub fn new(manager: &StateManager, module: impl Into<ModuleId>) -> Result<Self, StoreError> {
        let module = module.into();
        let Some((node, accepts)) = manager.lookup(&module) else {
            return Err(StoreError::UnknownModule { module });
        };
        Ok(Self {
            manager: manager.clone(),
            module,
            node,
            accepts: accepts.map(Arc::from),
        })
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Current state, if the node has been reduced at least once.
    pub fn state(&self) -> Option<State> {
        self.manager.current_state(&self.module)
    }

    /// Stream of this node's state: the current value first, then every
    /// change once, in dispatch order.
    pub fn select(&self) -> Subscription<State> {
        self.manager.subscribe_node(self.node, State::clone)
    }

    /// Like [`select`](Self::select), projected through `project`.
    pub fn select_map<T, F>(&self, project: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn(&State) -> T + Send + 'static,
    {
        self.manager.subscribe_node(self.node, project)
    }

    /// Dispatch `action` to the whole tree.
    pub fn dispatch(&self, action: impl Action) -> Result<DispatchReport, StoreError> {
        self.dispatch_shared(Arc::new(action))
    }

    pub fn dispatch_shared(&self, action: SharedAction) -> Result<DispatchReport, StoreError> {
        if let Some(accepts) = &self.accepts {
            if !accepts.iter().any(|kind| action.is_kind(*kind)) {
                tracing::warn!(
                    module = %self.module,
                    kind = %action.kind(),
                    "Rejected unauthorized action"
                );
                return Err(StoreError::Unauthorized {
                    module: self.module.clone(),
                    kind: action.kind(),
                });
            }
        }
        Ok(self.manager.dispatch(action)?)
    }
}
