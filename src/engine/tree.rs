//! Runtime tree: the live mirror of the specification tree.

use std::collections::HashMap;

use crate::action::ActionKind;
use crate::config::{ModuleId, SpecNode};
use crate::reducer::Reducer;
use crate::state::State;

pub(crate) struct RuntimeNode {
    pub(crate) module: ModuleId,
    pub(crate) reducer: Reducer,
    pub(crate) accepts: Option<Vec<ActionKind>>,
    pub(crate) state: Option<State>,
    pub(crate) children: Vec<usize>,
}

/// Nodes are stored in depth-first pre-order, so iterating `nodes` front to
/// back visits every parent before its children, and siblings in declared
/// order. Index 0 is the root.
pub(crate) struct RuntimeTree {
    nodes: Vec<RuntimeNode>,
    index: HashMap<ModuleId, usize>,
}

impl RuntimeTree {
    pub(crate) fn from_spec(spec: SpecNode) -> Self {
        let mut tree = RuntimeTree {
            nodes: Vec::with_capacity(spec.node_count()),
            index: HashMap::new(),
        };
        tree.push(spec);
        tree
    }

    fn push(&mut self, spec: SpecNode) -> usize {
        let (module, reducer, accepts, children) = spec.into_parts();
        let idx = self.nodes.len();
        self.index.insert(module.clone(), idx);
        self.nodes.push(RuntimeNode {
            module,
            reducer,
            accepts,
            state: None,
            children: Vec::with_capacity(children.len()),
        });
        for child in children {
            let child_idx = self.push(child);
            self.nodes[idx].children.push(child_idx);
        }
        idx
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, idx: usize) -> &RuntimeNode {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut RuntimeNode {
        &mut self.nodes[idx]
    }

    pub(crate) fn find(&self, module: &ModuleId) -> Option<usize> {
        self.index.get(module).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RuntimeNode> {
        self.nodes.iter()
    }
}
