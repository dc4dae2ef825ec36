//! Module registry, specification tree and options loading.

mod loader;
mod tree;
mod types;

use std::fmt;
use std::sync::Arc;

use crate::action::ActionKind;
use crate::reducer::{ActionSpec, Reducer};
use crate::state::State;

pub use loader::ConfigError;
pub use tree::{build_tree, SpecNode};
pub(crate) use tree::STATE_KEY;
pub use types::{CanopyOptions, DevtoolsOptions};

/// Identity of one module in the hierarchy.
///
/// The name doubles as the node's key in normalized snapshots.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(name: &str) -> Self {
        ModuleId::new(name)
    }
}

impl From<String> for ModuleId {
    fn from(name: String) -> Self {
        ModuleId::new(name)
    }
}

/// Per-module configuration record.
///
/// Reducer precedence when the tree is built: explicit [`reducer`](Self::reducer),
/// then [`actions`](Self::actions) composed with the initial state, then identity.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub(crate) id: ModuleId,
    pub(crate) children: Vec<ModuleId>,
    pub(crate) reducer: Option<Reducer>,
    pub(crate) actions: Option<ActionSpec>,
    pub(crate) initial_state: Option<State>,
    pub(crate) accepts: Option<Vec<ActionKind>>,
}

impl ModuleConfig {
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            children: Vec::new(),
            reducer: None,
            actions: None,
            initial_state: None,
            accepts: None,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn child(mut self, id: impl Into<ModuleId>) -> Self {
        self.children.push(id.into());
        self
    }

    pub fn children<I, M>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModuleId>,
    {
        self.children.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = Some(reducer);
        self
    }

    pub fn actions(mut self, spec: ActionSpec) -> Self {
        self.actions = Some(spec);
        self
    }

    pub fn initial_state(mut self, state: impl Into<State>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    /// Restrict the kinds a [`Store`](crate::store::Store) bound to this
    /// module may dispatch.
    pub fn accepts<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ActionKind>,
    {
        self.accepts = Some(kinds.into_iter().collect());
        self
    }
}

/// Flat list of module configurations, consumed once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: Vec<ModuleConfig>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, config: ModuleConfig) -> Self {
        self.modules.push(config);
        self
    }

    pub fn push(&mut self, config: ModuleConfig) {
        self.modules.push(config);
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleConfig> {
        self.modules.iter().find(|config| &config.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleConfig> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
