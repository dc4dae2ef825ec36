//! Debug bridge to an external time-travel inspector.
//!
//! The bridge is a plain consumer of the engine's public contract: it
//! listens to dispatch records, and answers inspector commands with
//! [`normalize`], [`denormalize`] and [`StateManager::dispatch`]. Without a
//! connection it is inert and the engine behaves identically.

mod history;
mod protocol;

use serde_json::{json, Value};

use crate::config::DevtoolsOptions;
use crate::engine::{DispatchRecord, StateManager, Subscription};
use crate::normalize::{denormalize, normalize, Snapshot};

use history::ActionLog;

pub use protocol::{
    DispatchPayload, InspectorChannel, InspectorConnection, InspectorMessage, Outbound,
    ProtocolError, TranscriptChannel,
};

use protocol::decode_state;

pub struct DebugBridge {
    manager: StateManager,
    link: Option<Link>,
}

struct Link {
    name: String,
    outbound: Box<dyn InspectorChannel>,
    inbound: tokio::sync::mpsc::UnboundedReceiver<String>,
    records: Subscription<DispatchRecord>,
    log: ActionLog,
    initial: Snapshot,
    committed: Snapshot,
    started: bool,
}

impl DebugBridge {
    /// Attach to `manager`. With no connection, or with devtools disabled,
    /// the bridge does nothing at all.
    ///
    /// If the manager is already initialized, `init` is sent right away;
    /// otherwise it goes out with the initialization pass.
    pub fn new(
        manager: &StateManager,
        connection: Option<InspectorConnection>,
        options: &DevtoolsOptions,
    ) -> Self {
        let link = match connection {
            Some(connection) if options.enabled => {
                let records = manager.subscribe_actions();
                let snapshot = normalize(manager);
                let mut link = Link {
                    name: options.name.clone(),
                    outbound: connection.outbound,
                    inbound: connection.inbound,
                    records,
                    log: ActionLog::new(snapshot.clone(), options.max_age),
                    initial: snapshot.clone(),
                    committed: snapshot.clone(),
                    started: false,
                };
                if manager.is_initialized() {
                    link.outbound.init(&snapshot.to_json());
                }
                tracing::info!(instance = %link.name, "Inspector connected");
                Some(link)
            }
            Some(_) => {
                tracing::debug!("Inspector connection ignored: devtools disabled");
                None
            }
            None => None,
        };
        Self {
            manager: manager.clone(),
            link,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Process everything pending: dispatch records first, then inbound
    /// messages one at a time in arrival order.
    pub fn drain(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        link.pump_records();
        while let Ok(raw) = link.inbound.try_recv() {
            link.on_message(&self.manager, &raw);
            link.pump_records();
        }
    }

    /// Relay until the inbound side of the connection closes.
    pub async fn run(mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        loop {
            tokio::select! {
                biased;
                Some(record) = link.records.recv() => link.on_record(record),
                message = link.inbound.recv() => match message {
                    Some(raw) => link.on_message(&self.manager, &raw),
                    None => break,
                },
            }
        }
        tracing::info!(instance = %link.name, "Inspector disconnected");
    }
}

impl Link {
    fn pump_records(&mut self) {
        while let Some(record) = self.records.try_next() {
            self.on_record(record);
        }
    }

    fn on_record(&mut self, record: DispatchRecord) {
        match record.action {
            None => {
                self.initial = record.snapshot.clone();
                self.committed = record.snapshot.clone();
                self.log.rebase(record.snapshot.clone());
                self.outbound.init(&record.snapshot.to_json());
            }
            Some(action) => {
                let descriptor = json!({ "type": action.label() });
                self.outbound.send(Some(&descriptor), &record.snapshot.to_json());
                self.log.push(action, record.snapshot);
            }
        }
    }

    fn on_message(&mut self, manager: &StateManager, raw: &str) {
        let result = InspectorMessage::parse(raw).and_then(|message| match message {
            InspectorMessage::Start => {
                self.started = true;
                Ok(())
            }
            InspectorMessage::Stop => {
                self.started = false;
                Ok(())
            }
            InspectorMessage::Dispatch { payload, state } if self.started => {
                self.on_command(manager, payload, state.as_ref())
            }
            InspectorMessage::Dispatch { .. } => {
                tracing::debug!(instance = %self.name, "Ignoring command before START");
                Ok(())
            }
            InspectorMessage::Action { .. } => Err(ProtocolError::UnsupportedAction),
        });
        if let Err(err) = result {
            tracing::warn!(instance = %self.name, error = %err, "Inspector message rejected");
            self.outbound.error(&err.to_string());
        }
    }

    fn on_command(
        &mut self,
        manager: &StateManager,
        payload: DispatchPayload,
        state: Option<&Value>,
    ) -> Result<(), ProtocolError> {
        tracing::debug!(instance = %self.name, command = ?payload, "Inspector command");
        match payload {
            DispatchPayload::Reset => {
                denormalize(&self.initial, manager);
                self.committed = self.initial.clone();
                self.log.rebase(self.initial.clone());
                self.outbound.init(&self.initial.to_json());
            }
            DispatchPayload::Commit => {
                self.committed = normalize(manager);
                self.log.rebase(self.committed.clone());
                self.outbound.init(&self.committed.to_json());
            }
            DispatchPayload::Rollback => {
                denormalize(&self.committed, manager);
                self.log.rebase(self.committed.clone());
                self.outbound.init(&self.committed.to_json());
            }
            DispatchPayload::JumpToState | DispatchPayload::JumpToAction => {
                let value = decode_state(state, "JUMP")?;
                let snapshot = Snapshot::from_json(value)
                    .ok_or(ProtocolError::InvalidSnapshot { command: "JUMP" })?;
                denormalize(&snapshot, manager);
            }
            DispatchPayload::ToggleAction { id } => self.toggle(manager, id),
            DispatchPayload::ImportState { next_lifted_state } => {
                let lifted = match next_lifted_state {
                    Value::String(text) => serde_json::from_str(&text)?,
                    other => other,
                };
                let last = lifted
                    .get("computedStates")
                    .and_then(Value::as_array)
                    .and_then(|states| states.last())
                    .ok_or(ProtocolError::EmptyImport)?;
                let value = decode_state(last.get("state"), "IMPORT_STATE")?;
                let snapshot = Snapshot::from_json(value).ok_or(ProtocolError::InvalidSnapshot {
                    command: "IMPORT_STATE",
                })?;
                denormalize(&snapshot, manager);
                // Imported actions cannot be rebuilt, so history restarts here.
                self.log.rebase(snapshot);
                self.outbound.send(None, &lifted);
            }
        }
        Ok(())
    }

    /// Skip or unskip one action and recompute everything after it.
    fn toggle(&mut self, manager: &StateManager, id: u64) {
        self.pump_records();
        let Some(index) = self.log.toggle(id) else {
            tracing::debug!(instance = %self.name, id, "Toggle for unknown action id");
            return;
        };

        denormalize(self.log.snapshot_before(index), manager);
        for i in index..self.log.len() {
            if let Some(action) = self.log.active_action(i) {
                if let Err(err) = manager.dispatch(action) {
                    self.outbound.error(&err.to_string());
                }
            }
            self.log.set_snapshot(i, normalize(manager));
        }
        // Replayed dispatches are already in the log.
        self.records.drain();

        self.outbound.send(None, &self.log.lifted_state());
    }
}
