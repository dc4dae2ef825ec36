//! Specification tree builder.

use std::collections::{HashMap, HashSet};

use crate::action::ActionKind;
use crate::config::{ConfigError, ModuleConfig, ModuleId, Registry};
use crate::reducer::{compose, Reducer};

/// Snapshot field name; a child module may not use it.
pub(crate) const STATE_KEY: &str = "state";

/// Static description of one module: its reducer and declared children.
#[derive(Debug, Clone)]
pub struct SpecNode {
    module: ModuleId,
    reducer: Reducer,
    accepts: Option<Vec<ActionKind>>,
    children: Vec<SpecNode>,
}

impl SpecNode {
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    pub fn accepts(&self) -> Option<&[ActionKind]> {
        self.accepts.as_deref()
    }

    pub fn children(&self) -> &[SpecNode] {
        &self.children
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SpecNode::node_count).sum::<usize>()
    }

    pub(crate) fn into_parts(self) -> (ModuleId, Reducer, Option<Vec<ActionKind>>, Vec<SpecNode>) {
        (self.module, self.reducer, self.accepts, self.children)
    }
}

/// Build the specification tree from a flat registry.
///
/// The root is the single registered module nobody declares as a child.
pub fn build_tree(registry: &Registry) -> Result<SpecNode, ConfigError> {
    let mut registered = HashSet::with_capacity(registry.len());
    for config in registry.iter() {
        if !registered.insert(config.id.clone()) {
            return Err(ConfigError::DuplicateModule {
                module: config.id.clone(),
            });
        }
    }

    let mut parent_of: HashMap<&ModuleId, &ModuleId> = HashMap::new();
    for config in registry.iter() {
        for child in &config.children {
            if !registered.contains(child) {
                return Err(ConfigError::UnregisteredChild {
                    parent: config.id.clone(),
                    child: child.clone(),
                });
            }
            if child.name() == STATE_KEY {
                return Err(ConfigError::ReservedName {
                    module: child.clone(),
                });
            }
            if let Some(first) = parent_of.insert(child, &config.id) {
                return Err(ConfigError::MultipleParents {
                    child: child.clone(),
                    first: first.clone(),
                    second: config.id.clone(),
                });
            }
        }
    }

    let candidates: Vec<&ModuleConfig> = registry
        .iter()
        .filter(|config| !parent_of.contains_key(&config.id))
        .collect();
    let root = match candidates.as_slice() {
        [] => return Err(ConfigError::NoRoot),
        [root] => *root,
        many => {
            return Err(ConfigError::MultipleRoots {
                modules: many.iter().map(|config| config.id.clone()).collect(),
            })
        }
    };

    let tree = to_spec_node(registry, root)?;

    if tree.node_count() != registry.len() {
        let mut reached = HashSet::new();
        collect_modules(&tree, &mut reached);
        return Err(ConfigError::Unreachable {
            modules: registry
                .iter()
                .map(|config| config.id.clone())
                .filter(|id| !reached.contains(id))
                .collect(),
        });
    }

    tracing::debug!(root = %tree.module, nodes = tree.node_count(), "Specification tree built");
    Ok(tree)
}

fn to_spec_node(registry: &Registry, config: &ModuleConfig) -> Result<SpecNode, ConfigError> {
    let reducer = reducer_for(config).map_err(|source| ConfigError::InvalidModule {
        module: config.id.clone(),
        source: Box::new(source),
    })?;

    let mut children = Vec::with_capacity(config.children.len());
    for child in &config.children {
        // Presence was checked by build_tree.
        let Some(child_config) = registry.get(child) else {
            return Err(ConfigError::UnregisteredChild {
                parent: config.id.clone(),
                child: child.clone(),
            });
        };
        children.push(to_spec_node(registry, child_config)?);
    }

    Ok(SpecNode {
        module: config.id.clone(),
        reducer,
        accepts: config.accepts.clone(),
        children,
    })
}

fn reducer_for(config: &ModuleConfig) -> Result<Reducer, ConfigError> {
    if let Some(reducer) = &config.reducer {
        return Ok(reducer.clone());
    }
    if let Some(spec) = &config.actions {
        return compose(spec, config.initial_state.as_ref());
    }
    if config.initial_state.is_some() {
        tracing::warn!(
            module = %config.id,
            "Initial state ignored: module declares neither actions nor a reducer"
        );
    }
    Ok(Reducer::identity())
}

fn collect_modules(node: &SpecNode, out: &mut HashSet<ModuleId>) {
    out.insert(node.module.clone());
    for child in &node.children {
        collect_modules(child, out);
    }
}
