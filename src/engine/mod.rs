//! State manager: the dispatch engine.
//!
//! Owns the runtime tree and is its only mutator. A dispatch visits every
//! node in depth-first pre-order (parent before children, siblings in
//! declared order). Each node runs its own reducer, and a node whose new
//! state is not [`State::same`] as the old one is replaced and announced.
//! Children are visited whether or not their parent changed.
//!
//! # Consistency caveat
//!
//! A reducer error stops the pass where it happened. Nodes visited before the
//! failing one keep their new state and their change notifications are still
//! delivered. Nodes after it keep their old state. There is no rollback
//! across nodes.

mod channel;
mod tree;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::action::{ActionKind, ReduceError, SharedAction};
use crate::config::{build_tree, ConfigError, ModuleId, Registry, SpecNode};
use crate::normalize::{snapshot_of, Snapshot};
use crate::state::State;

pub use channel::Subscription;
pub(crate) use tree::RuntimeTree;

use channel::Listeners;

/// A reducer failed during a dispatch pass.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Reducer for module '{module}' failed on '{action}': {source}")]
    Reduce {
        module: ModuleId,
        action: String,
        #[source]
        source: ReduceError,
    },
}

/// One node's state changed. `state` is `None` only when a snapshot restore
/// returned the node to having no state.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub module: ModuleId,
    pub state: Option<State>,
}

/// Emitted after every successful pass. `action` is `None` for the
/// initialization pass.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub action: Option<SharedAction>,
    pub snapshot: Snapshot,
}

/// Modules whose state changed during a pass, in visit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub changed: Vec<ModuleId>,
}

/// Explicit context object holding the runtime tree and its channels.
///
/// Cloning is cheap; all clones share one tree.
#[derive(Clone)]
pub struct StateManager {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    tree: RuntimeTree,
    initialized: bool,
    node_listeners: Vec<Listeners<State>>,
    changes: Listeners<StateChange>,
    records: Listeners<DispatchRecord>,
    errors: Listeners<DispatchError>,
}

impl StateManager {
    /// Materialize the runtime tree for `spec`. Every node starts without
    /// state until [`initialize`](Self::initialize) runs.
    pub fn new(spec: SpecNode) -> Self {
        let tree = RuntimeTree::from_spec(spec);
        let node_listeners = (0..tree.len()).map(|_| Listeners::default()).collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tree,
                initialized: false,
                node_listeners,
                changes: Listeners::default(),
                records: Listeners::default(),
                errors: Listeners::default(),
            })),
        }
    }

    /// Build the specification tree from `registry` and wrap it.
    pub fn from_registry(registry: &Registry) -> Result<Self, ConfigError> {
        Ok(Self::new(build_tree(registry)?))
    }

    /// Seed every node by running one pass with no action.
    ///
    /// Initial state goes through the same reducers as any dispatch.
    pub fn initialize(&self) -> Result<DispatchReport, DispatchError> {
        let report = self.run_pass(None)?;
        self.inner.lock().initialized = true;
        tracing::info!(changed = report.changed.len(), "State tree initialized");
        Ok(report)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Apply `action` to every node. Synchronous: all nodes reflect the
    /// action by the time this returns.
    pub fn dispatch(&self, action: SharedAction) -> Result<DispatchReport, DispatchError> {
        self.run_pass(Some(action))
    }

    /// Current state of `module`, or `None` if it has none yet or is unknown.
    pub fn current_state(&self, module: &ModuleId) -> Option<State> {
        let inner = self.inner.lock();
        let idx = inner.tree.find(module)?;
        inner.tree.node(idx).state.clone()
    }

    pub fn contains(&self, module: &ModuleId) -> bool {
        self.inner.lock().tree.find(module).is_some()
    }

    /// All modules in visit order, root first.
    pub fn modules(&self) -> Vec<ModuleId> {
        self.inner
            .lock()
            .tree
            .iter()
            .map(|node| node.module.clone())
            .collect()
    }

    pub fn subscribe_changes(&self) -> Subscription<StateChange> {
        self.inner.lock().changes.subscribe()
    }

    pub fn subscribe_actions(&self) -> Subscription<DispatchRecord> {
        self.inner.lock().records.subscribe()
    }

    pub fn subscribe_errors(&self) -> Subscription<DispatchError> {
        self.inner.lock().errors.subscribe()
    }

    /// Subscribe to one node's state, replaying its current state first.
    ///
    /// `project` runs on the receiving side, never under the tree lock.
    pub(crate) fn subscribe_node<T, F>(&self, idx: usize, project: F) -> Subscription<T>
    where
        T: 'static,
        F: Fn(&State) -> T + Send + 'static,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let current = inner.tree.node(idx).state.as_ref();
        inner.node_listeners[idx].subscribe_map(current, project)
    }

    /// Node index and accepted kinds for `module`.
    pub(crate) fn lookup(&self, module: &ModuleId) -> Option<(usize, Option<Vec<ActionKind>>)> {
        let inner = self.inner.lock();
        let idx = inner.tree.find(module)?;
        Some((idx, inner.tree.node(idx).accepts.clone()))
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&RuntimeTree) -> R) -> R {
        f(&self.inner.lock().tree)
    }

    /// Administrative override used by `denormalize`. Bypasses reducers.
    ///
    /// `None` returns a node to having no state. States deep-equal to the
    /// current one are skipped, so restoring a snapshot of the present is a
    /// no-op.
    pub(crate) fn restore(&self, updates: Vec<(usize, Option<State>)>) -> Vec<ModuleId> {
        let mut inner = self.inner.lock();
        let mut changed = Vec::new();
        for (idx, state) in updates {
            let node = inner.tree.node_mut(idx);
            if node.state == state {
                continue;
            }
            node.state = state;
            changed.push(idx);
        }
        let modules = inner.announce(&changed);
        if !modules.is_empty() {
            tracing::debug!(changed = modules.len(), "State restored from snapshot");
        }
        modules
    }

    fn run_pass(&self, action: Option<SharedAction>) -> Result<DispatchReport, DispatchError> {
        let mut inner = self.inner.lock();
        let label = action.as_ref().map(|a| a.label());

        let mut changed = Vec::new();
        let mut failure = None;
        for idx in 0..inner.tree.len() {
            let node = inner.tree.node_mut(idx);
            let reduced = match node.reducer.reduce(node.state.as_ref(), action.as_deref()) {
                Ok(None) if node.state.is_some() => Err(ReduceError::StateCleared),
                other => other,
            };
            match reduced {
                Ok(next) => {
                    let same = match (&next, &node.state) {
                        (Some(a), Some(b)) => State::same(a, b),
                        (None, None) => true,
                        _ => false,
                    };
                    if !same {
                        node.state = next;
                        changed.push(idx);
                    }
                }
                Err(source) => {
                    failure = Some(DispatchError::Reduce {
                        module: node.module.clone(),
                        action: label.clone().unwrap_or_else(|| "<initialize>".to_string()),
                        source,
                    });
                    break;
                }
            }
        }

        let modules = inner.announce(&changed);

        if let Some(err) = failure {
            tracing::error!(error = %err, applied = modules.len(), "Dispatch aborted");
            inner.errors.publish(&err);
            return Err(err);
        }

        tracing::trace!(action = label.as_deref().unwrap_or("<initialize>"), changed = modules.len(), "Dispatched");

        if !inner.records.is_empty() {
            let record = DispatchRecord {
                action,
                snapshot: snapshot_of(&inner.tree),
            };
            inner.records.publish(&record);
        }

        Ok(DispatchReport { changed: modules })
    }
}

impl Inner {
    /// Notify node and change subscribers for `changed`, in order.
    ///
    /// Node subscribers only ever see states; a cleared node is reported on
    /// the change channel alone.
    fn announce(&mut self, changed: &[usize]) -> Vec<ModuleId> {
        let mut modules = Vec::with_capacity(changed.len());
        for &idx in changed {
            let node = self.tree.node(idx);
            if let Some(state) = &node.state {
                self.node_listeners[idx].publish(state);
            }
            let change = StateChange {
                module: node.module.clone(),
                state: node.state.clone(),
            };
            self.changes.publish(&change);
            modules.push(change.module);
        }
        modules
    }
}
