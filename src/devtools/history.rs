//! Retained action log backing time travel.

use serde_json::{json, Map, Value};

use crate::action::SharedAction;
use crate::normalize::Snapshot;

struct Entry {
    id: u64,
    action: SharedAction,
    skipped: bool,
    snapshot: Snapshot,
}

/// Actions dispatched since the last baseline, with the snapshot each one
/// produced. Ids start at 1; id 0 is the inspector's implicit init entry.
pub(crate) struct ActionLog {
    base: Snapshot,
    entries: Vec<Entry>,
    next_id: u64,
    max_age: usize,
}

impl ActionLog {
    pub(crate) fn new(base: Snapshot, max_age: usize) -> Self {
        Self {
            base,
            entries: Vec::new(),
            next_id: 1,
            max_age: max_age.max(1),
        }
    }

    /// Drop every entry and start again from `base`.
    pub(crate) fn rebase(&mut self, base: Snapshot) {
        self.base = base;
        self.entries.clear();
    }

    /// Append an action. Beyond `max_age` the oldest entry is folded into the
    /// base.
    pub(crate) fn push(&mut self, action: SharedAction, snapshot: Snapshot) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            action,
            skipped: false,
            snapshot,
        });
        while self.entries.len() > self.max_age {
            let folded = self.entries.remove(0);
            self.base = folded.snapshot;
        }
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flip the skip flag of `id`; returns its position.
    pub(crate) fn toggle(&mut self, id: u64) -> Option<usize> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let entry = &mut self.entries[index];
        entry.skipped = !entry.skipped;
        Some(index)
    }

    /// Snapshot in effect just before the entry at `index`.
    pub(crate) fn snapshot_before(&self, index: usize) -> &Snapshot {
        match index {
            0 => &self.base,
            _ => &self.entries[index - 1].snapshot,
        }
    }

    /// Action at `index`, or `None` when it is skipped.
    pub(crate) fn active_action(&self, index: usize) -> Option<SharedAction> {
        let entry = &self.entries[index];
        (!entry.skipped).then(|| entry.action.clone())
    }

    pub(crate) fn set_snapshot(&mut self, index: usize, snapshot: Snapshot) {
        self.entries[index].snapshot = snapshot;
    }

    /// The log in the inspector's lifted-state shape.
    pub(crate) fn lifted_state(&self) -> Value {
        let mut actions_by_id = Map::new();
        actions_by_id.insert(
            "0".to_string(),
            json!({"type": "PERFORM_ACTION", "action": {"type": "@@INIT"}}),
        );
        let mut staged = vec![json!(0)];
        let mut skipped = Vec::new();
        let mut computed = vec![json!({"state": self.base.to_json()})];

        for entry in &self.entries {
            actions_by_id.insert(
                entry.id.to_string(),
                json!({"type": "PERFORM_ACTION", "action": {"type": entry.action.label()}}),
            );
            staged.push(json!(entry.id));
            if entry.skipped {
                skipped.push(json!(entry.id));
            }
            computed.push(json!({"state": entry.snapshot.to_json()}));
        }

        json!({
            "nextActionId": self.next_id,
            "actionsById": actions_by_id,
            "stagedActionIds": staged,
            "skippedActionIds": skipped,
            "committedState": self.base.to_json(),
            "currentStateIndex": self.entries.len(),
            "computedStates": computed,
        })
    }
}
