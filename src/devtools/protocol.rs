//! Inspector wire shapes.
//!
//! Inbound messages arrive as raw JSON text:
//! `{"type": "START" | "STOP" | "DISPATCH" | "ACTION", "payload": {..}, "state": ".."}`.
//! Outbound traffic goes through an [`InspectorChannel`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Problems with an inbound inspector message. Never fatal to the engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed inspector message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{command} requires a state")]
    MissingState { command: &'static str },

    #[error("{command} state must be a JSON object")]
    InvalidSnapshot { command: &'static str },

    #[error("Imported history has no computed states")]
    EmptyImport,

    #[error("Remote action dispatch is not supported")]
    UnsupportedAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectorMessage {
    Start,
    Stop,
    Dispatch {
        payload: DispatchPayload,
        #[serde(default)]
        state: Option<Value>,
    },
    Action {
        #[serde(default)]
        action: Option<Value>,
    },
}

impl InspectorMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchPayload {
    Reset,
    Commit,
    Rollback,
    JumpToState,
    JumpToAction,
    ToggleAction {
        id: u64,
    },
    ImportState {
        #[serde(rename = "nextLiftedState")]
        next_lifted_state: Value,
    },
}

/// Decode a state carried by the inspector. The inspector usually sends it
/// as JSON text, but an inline object is accepted too.
pub(crate) fn decode_state(
    state: Option<&Value>,
    command: &'static str,
) -> Result<Value, ProtocolError> {
    match state {
        None | Some(Value::Null) => Err(ProtocolError::MissingState { command }),
        Some(Value::String(text)) => Ok(serde_json::from_str(text)?),
        Some(other) => Ok(other.clone()),
    }
}

/// Outbound half of the inspector connection.
pub trait InspectorChannel: Send {
    /// Announce a fresh baseline state.
    fn init(&mut self, state: &Value);

    /// Report an action with the state it produced. `action` is `None` when
    /// `state` is a whole lifted history.
    fn send(&mut self, action: Option<&Value>, state: &Value);

    /// Surface a non-fatal problem to the inspector.
    fn error(&mut self, message: &str);
}

/// Bidirectional inspector link: outbound channel plus inbound raw messages.
pub struct InspectorConnection {
    pub(crate) outbound: Box<dyn InspectorChannel>,
    pub(crate) inbound: mpsc::UnboundedReceiver<String>,
}

impl InspectorConnection {
    pub fn new(
        outbound: impl InspectorChannel + 'static,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            outbound: Box::new(outbound),
            inbound,
        }
    }

    /// Build a connection together with the sender the host uses to deliver
    /// inbound messages.
    pub fn with_sender(
        outbound: impl InspectorChannel + 'static,
    ) -> (Self, mpsc::UnboundedSender<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(outbound, receiver), sender)
    }
}

/// One outbound message, as recorded by [`TranscriptChannel`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Init { state: Value },
    Send { action: Option<Value>, state: Value },
    Error { message: String },
}

/// In-memory channel that keeps every outbound message.
#[derive(Clone, Default)]
pub struct TranscriptChannel {
    messages: Arc<Mutex<Vec<Outbound>>>,
}

impl TranscriptChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Outbound> {
        self.messages.lock().clone()
    }

    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl InspectorChannel for TranscriptChannel {
    fn init(&mut self, state: &Value) {
        self.messages.lock().push(Outbound::Init {
            state: state.clone(),
        });
    }

    fn send(&mut self, action: Option<&Value>, state: &Value) {
        self.messages.lock().push(Outbound::Send {
            action: action.cloned(),
            state: state.clone(),
        });
    }

    fn error(&mut self, message: &str) {
        self.messages.lock().push(Outbound::Error {
            message: message.to_string(),
        });
    }
}
