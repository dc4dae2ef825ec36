//! Shared fixtures: a counter module tree and an in-memory inspector.

#![allow(dead_code, unused_imports)]

use canopy::devtools::{DebugBridge, InspectorConnection, Outbound, TranscriptChannel};
use canopy::{
    Action, ActionKind, ActionSpec, DevtoolsOptions, ModuleConfig, ReduceError, Registry, State,
    StateManager,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

pub const INCREMENT: ActionKind = ActionKind::new("[counter] Increment");
pub const DECREMENT: ActionKind = ActionKind::new("[counter] Decrement");
pub const UNKNOWN: ActionKind = ActionKind::new("[nowhere] Unknown");

pub struct Increment;

impl Action for Increment {
    fn kind(&self) -> ActionKind {
        INCREMENT
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        let value = state.get("value").and_then(State::as_i64).unwrap_or(0);
        Ok(state.with("value", State::from(value + 1)))
    }
}

pub struct Decrement;

impl Action for Decrement {
    fn kind(&self) -> ActionKind {
        DECREMENT
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        let value = state.get("value").and_then(State::as_i64).unwrap_or(0);
        Ok(state.with("value", State::from(value - 1)))
    }
}

pub struct Unknown;

impl Action for Unknown {
    fn kind(&self) -> ActionKind {
        UNKNOWN
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        Ok(state.with("touched", State::from(true)))
    }
}

/// `root` with a single `counter` child starting at `{"value": 0}`.
pub fn counter_registry() -> Registry {
    Registry::new()
        .register(ModuleConfig::new("root").child("counter"))
        .register(
            ModuleConfig::new("counter")
                .actions(ActionSpec::kinds([INCREMENT, DECREMENT]))
                .initial_state(json!({"value": 0})),
        )
}

pub fn counter_manager() -> StateManager {
    let manager = StateManager::from_registry(&counter_registry()).expect("valid registry");
    manager.initialize().expect("initialization succeeds");
    manager
}

pub fn counter_value(manager: &StateManager) -> Option<i64> {
    manager
        .current_state(&"counter".into())
        .and_then(|state| state.get("value").and_then(State::as_i64))
}

/// Bridge wired to an in-memory transcript.
pub struct Inspector {
    pub bridge: DebugBridge,
    pub transcript: TranscriptChannel,
    pub inbound: UnboundedSender<String>,
}

impl Inspector {
    pub fn attach(manager: &StateManager) -> Self {
        Self::attach_with(manager, &DevtoolsOptions::default())
    }

    pub fn attach_with(manager: &StateManager, options: &DevtoolsOptions) -> Self {
        let transcript = TranscriptChannel::new();
        let (connection, inbound) = InspectorConnection::with_sender(transcript.clone());
        let bridge = DebugBridge::new(manager, Some(connection), options);
        Self {
            bridge,
            transcript,
            inbound,
        }
    }

    /// Deliver a raw message and process it.
    pub fn send(&mut self, message: Value) {
        self.inbound
            .send(message.to_string())
            .expect("bridge is listening");
        self.bridge.drain();
    }

    pub fn start(&mut self) {
        self.send(json!({"type": "START"}));
    }

    pub fn command(&mut self, payload: Value) {
        self.send(json!({"type": "DISPATCH", "payload": payload}));
    }

    pub fn take(&mut self) -> Vec<Outbound> {
        self.bridge.drain();
        self.transcript.take()
    }
}
