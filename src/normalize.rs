//! Normalized snapshots of the runtime tree.
//!
//! A snapshot is a plain JSON map mirroring the tree. The root's entry is the
//! snapshot itself. Each entry holds the node's state under `"state"` (omitted
//! while the node has none) and one nested entry per child, keyed by the
//! child module's name:
//!
//! ```text
//! { "counter": { "state": { "value": 2 } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ModuleId, STATE_KEY};
use crate::engine::{RuntimeTree, StateManager};
use crate::state::State;

/// Serializable, debug-friendly projection of the runtime tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// Wrap a JSON value; anything but an object yields `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Snapshot(map)),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// State recorded for the node at `path` (child names below the root).
    /// An empty path addresses the root.
    pub fn state_at(&self, path: &[&str]) -> Option<&Value> {
        let mut entry = &self.0;
        for name in path {
            entry = entry.get(*name)?.as_object()?;
        }
        entry.get(STATE_KEY)
    }
}

/// Snapshot the whole tree managed by `manager`.
pub fn normalize(manager: &StateManager) -> Snapshot {
    manager.read(snapshot_of)
}

pub(crate) fn snapshot_of(tree: &RuntimeTree) -> Snapshot {
    Snapshot(entry_for(tree, 0))
}

fn entry_for(tree: &RuntimeTree, idx: usize) -> Map<String, Value> {
    let node = tree.node(idx);
    let mut entry = Map::new();
    if let Some(state) = &node.state {
        entry.insert(STATE_KEY.to_string(), state.to_json());
    }
    for &child in &node.children {
        entry.insert(
            tree.node(child).module.name().to_string(),
            Value::Object(entry_for(tree, child)),
        );
    }
    entry
}

/// Overwrite node states from `snapshot`, bypassing reducers.
///
/// This is an administrative restore, not a dispatched action. A matched
/// entry without `"state"` leaves its node with no state, mirroring what
/// [`normalize`] records. Keys without a matching node are ignored so
/// partially stale history still applies. Returns the modules whose state
/// actually changed.
pub fn denormalize(snapshot: &Snapshot, manager: &StateManager) -> Vec<ModuleId> {
    let updates = manager.read(|tree| {
        let mut updates = Vec::new();
        collect_updates(tree, 0, &snapshot.0, &mut updates);
        updates
    });
    manager.restore(updates)
}

fn collect_updates(
    tree: &RuntimeTree,
    idx: usize,
    entry: &Map<String, Value>,
    out: &mut Vec<(usize, Option<State>)>,
) {
    let node = tree.node(idx);
    out.push((idx, entry.get(STATE_KEY).cloned().map(State::from)));
    for (key, value) in entry {
        if key == STATE_KEY {
            continue;
        }
        let child = node
            .children
            .iter()
            .copied()
            .find(|&child| tree.node(child).module.name() == key);
        match (child, value.as_object()) {
            (Some(child), Some(child_entry)) => collect_updates(tree, child, child_entry, out),
            (Some(_), None) => {
                tracing::debug!(module = %key, "Skipping snapshot entry that is not a map");
            }
            (None, _) => {
                tracing::debug!(key = %key, parent = %node.module, "Ignoring unknown snapshot key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Assign;
    use crate::config::{ModuleConfig, Registry};
    use crate::reducer::ActionSpec;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> StateManager {
        let registry = Registry::new()
            .register(ModuleConfig::new("root").children(["panel"]))
            .register(
                ModuleConfig::new("panel")
                    .child("detail")
                    .actions(ActionSpec::kinds([Assign::KIND]))
                    .initial_state(json!({"open": false})),
            )
            .register(ModuleConfig::new("detail"));
        let manager = StateManager::from_registry(&registry).unwrap();
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn stateless_nodes_omit_state_but_keep_children() {
        let snapshot = normalize(&manager());
        assert_eq!(
            snapshot.to_json(),
            json!({"panel": {"state": {"open": false}, "detail": {}}})
        );
    }

    #[test]
    fn denormalize_overwrites_matching_nodes() {
        let manager = manager();
        let snapshot = Snapshot::from_json(json!({"panel": {"state": {"open": true}}})).unwrap();
        let changed = denormalize(&snapshot, &manager);
        assert_eq!(changed.len(), 1);
        assert_eq!(
            manager.current_state(&"panel".into()),
            Some(State::from(json!({"open": true})))
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let manager = manager();
        let snapshot = Snapshot::from_json(json!({
            "gone": {"state": {"x": 1}},
            "panel": {"retired": {"state": 1}, "state": {"open": true}}
        }))
        .unwrap();
        denormalize(&snapshot, &manager);
        assert_eq!(
            normalize(&manager).to_json(),
            json!({"panel": {"state": {"open": true}, "detail": {}}})
        );
    }

    #[test]
    fn round_trip_is_a_no_op() {
        let manager = manager();
        manager
            .dispatch(Arc::new(Assign::new(json!({"open": true, "tab": "a"}))))
            .unwrap();
        let before = manager.current_state(&"panel".into()).unwrap();
        let changed = denormalize(&normalize(&manager), &manager);
        assert!(changed.is_empty());
        let after = manager.current_state(&"panel".into()).unwrap();
        assert!(State::same(&before, &after));
    }

    #[test]
    fn entry_without_state_clears_the_node() {
        let manager = manager();
        let snapshot = Snapshot::from_json(json!({"panel": {"detail": {}}})).unwrap();
        let changed = denormalize(&snapshot, &manager);
        assert_eq!(changed, vec![ModuleId::from("panel")]);
        assert!(manager.current_state(&"panel".into()).is_none());
    }

    #[test]
    fn state_at_walks_children() {
        let snapshot = normalize(&manager());
        assert_eq!(snapshot.state_at(&["panel"]), Some(&json!({"open": false})));
        assert_eq!(snapshot.state_at(&["panel", "detail"]), None);
        assert_eq!(snapshot.state_at(&[]), None);
    }
}
