mod common;

use std::sync::Arc;

use canopy::devtools::{DebugBridge, InspectorConnection, Outbound, TranscriptChannel};
use canopy::{
    normalize, DevtoolsOptions, ModuleConfig, Reducer, Registry, State, StateManager,
};
use common::*;
use serde_json::{json, Value};

fn init_state(messages: &[Outbound]) -> Option<&Value> {
    messages.iter().rev().find_map(|message| match message {
        Outbound::Init { state } => Some(state),
        _ => None,
    })
}

#[test]
fn init_is_sent_with_the_initialization_pass() {
    let manager = StateManager::from_registry(&counter_registry()).unwrap();
    let mut inspector = Inspector::attach(&manager);
    assert!(inspector.take().is_empty());

    manager.initialize().unwrap();

    assert_eq!(
        inspector.take(),
        vec![Outbound::Init {
            state: json!({"counter": {"state": {"value": 0}}})
        }]
    );
}

#[test]
fn attaching_late_sends_init_immediately() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    assert_eq!(
        init_state(&inspector.take()),
        Some(&json!({"counter": {"state": {"value": 0}}}))
    );
}

#[test]
fn each_dispatch_is_reported_with_its_snapshot() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.take();

    manager.dispatch(Arc::new(Increment)).unwrap();

    assert_eq!(
        inspector.take(),
        vec![Outbound::Send {
            action: Some(json!({"type": "[counter] Increment"})),
            state: json!({"counter": {"state": {"value": 1}}}),
        }]
    );
}

#[test]
fn reset_restores_the_initial_snapshot() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    for _ in 0..3 {
        manager.dispatch(Arc::new(Increment)).unwrap();
    }
    inspector.take();

    inspector.command(json!({"type": "RESET"}));

    assert_eq!(counter_value(&manager), Some(0));
    assert_eq!(
        init_state(&inspector.take()),
        Some(&json!({"counter": {"state": {"value": 0}}}))
    );
}

/// `lazy` has no state until the first increment, then counts them.
fn lazy_manager() -> StateManager {
    let lazy = Reducer::new(|state, action| match action {
        Some(action) if action.is_kind(INCREMENT) => {
            let n = state
                .and_then(|s| s.get("n"))
                .and_then(State::as_i64)
                .unwrap_or(0);
            Ok(Some(State::from(json!({"n": n + 1}))))
        }
        _ => Ok(state.cloned()),
    });
    let registry = Registry::new()
        .register(ModuleConfig::new("root").child("lazy"))
        .register(ModuleConfig::new("lazy").reducer(lazy));
    let manager = StateManager::from_registry(&registry).unwrap();
    manager.initialize().unwrap();
    manager
}

#[test]
fn reset_returns_lazy_node_to_no_state() {
    let manager = lazy_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    manager.dispatch(Arc::new(Increment)).unwrap();
    inspector.take();

    inspector.command(json!({"type": "RESET"}));

    assert_eq!(normalize(&manager).to_json(), json!({"lazy": {}}));
    assert!(manager.current_state(&"lazy".into()).is_none());
}

#[test]
fn toggling_the_first_action_returns_lazy_node_to_no_state() {
    let manager = lazy_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    manager.dispatch(Arc::new(Increment)).unwrap();
    inspector.take();

    inspector.command(json!({"type": "TOGGLE_ACTION", "id": 1}));

    assert_eq!(normalize(&manager), normalize(&lazy_manager()));
    assert_eq!(normalize(&manager).to_json(), json!({"lazy": {}}));
}

#[test]
fn commands_before_start_are_ignored() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    manager.dispatch(Arc::new(Increment)).unwrap();

    inspector.command(json!({"type": "RESET"}));
    assert_eq!(counter_value(&manager), Some(1));

    inspector.start();
    inspector.send(json!({"type": "STOP"}));
    inspector.command(json!({"type": "RESET"}));
    assert_eq!(counter_value(&manager), Some(1));
}

#[test]
fn commit_then_rollback_returns_to_committed_state() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    manager.dispatch(Arc::new(Increment)).unwrap();
    inspector.command(json!({"type": "COMMIT"}));
    manager.dispatch(Arc::new(Increment)).unwrap();
    manager.dispatch(Arc::new(Increment)).unwrap();

    inspector.command(json!({"type": "ROLLBACK"}));

    assert_eq!(counter_value(&manager), Some(1));
}

#[test]
fn jump_applies_the_carried_state() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    inspector.take();

    inspector.send(json!({
        "type": "DISPATCH",
        "payload": {"type": "JUMP_TO_STATE", "index": 1},
        "state": r#"{"counter": {"state": {"value": 7}}}"#
    }));

    assert_eq!(counter_value(&manager), Some(7));
    // Jumping is not an action, so nothing is reported back.
    assert!(inspector.take().is_empty());
}

#[test]
fn jump_without_state_reports_an_error() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    inspector.take();

    inspector.command(json!({"type": "JUMP_TO_ACTION", "actionId": 1}));

    let messages = inspector.take();
    assert!(matches!(messages.as_slice(), [Outbound::Error { .. }]));
    assert_eq!(counter_value(&manager), Some(0));
}

#[test]
fn toggle_matches_dispatching_without_the_skipped_action() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    manager.dispatch(Arc::new(Increment)).unwrap();
    manager.dispatch(Arc::new(Increment)).unwrap();
    manager.dispatch(Arc::new(Decrement)).unwrap();
    manager.dispatch(Arc::new(Increment)).unwrap();
    inspector.take();

    inspector.command(json!({"type": "TOGGLE_ACTION", "id": 2}));

    let expected = {
        let reference = counter_manager();
        reference.dispatch(Arc::new(Increment)).unwrap();
        reference.dispatch(Arc::new(Decrement)).unwrap();
        reference.dispatch(Arc::new(Increment)).unwrap();
        normalize(&reference)
    };
    assert_eq!(normalize(&manager), expected);

    let messages = inspector.take();
    let [Outbound::Send { action: None, state: lifted }] = messages.as_slice() else {
        panic!("expected one lifted-state message, got {messages:?}");
    };
    assert_eq!(lifted["skippedActionIds"], json!([2]));
    assert_eq!(lifted["computedStates"][4]["state"], expected.to_json());

    // Toggling again restores the original history.
    inspector.command(json!({"type": "TOGGLE_ACTION", "id": 2}));
    assert_eq!(counter_value(&manager), Some(2));
}

#[test]
fn import_applies_the_last_computed_state() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    inspector.take();
    let lifted = json!({
        "computedStates": [
            {"state": {"counter": {"state": {"value": 0}}}},
            {"state": {"counter": {"state": {"value": 5}}}}
        ]
    });

    inspector.command(json!({"type": "IMPORT_STATE", "nextLiftedState": lifted.clone()}));

    assert_eq!(counter_value(&manager), Some(5));
    assert_eq!(
        inspector.take(),
        vec![Outbound::Send {
            action: None,
            state: lifted
        }]
    );
}

#[test]
fn empty_import_is_rejected() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.start();
    inspector.take();

    inspector.command(json!({"type": "IMPORT_STATE", "nextLiftedState": {"computedStates": []}}));

    assert!(matches!(inspector.take().as_slice(), [Outbound::Error { .. }]));
}

#[test]
fn history_beyond_max_age_folds_into_the_base() {
    let manager = counter_manager();
    let options = DevtoolsOptions {
        max_age: 2,
        ..DevtoolsOptions::default()
    };
    let mut inspector = Inspector::attach_with(&manager, &options);
    inspector.start();
    for _ in 0..4 {
        manager.dispatch(Arc::new(Increment)).unwrap();
    }
    inspector.take();

    inspector.command(json!({"type": "TOGGLE_ACTION", "id": 4}));

    let messages = inspector.take();
    let [Outbound::Send { state: lifted, .. }] = messages.as_slice() else {
        panic!("expected one lifted-state message, got {messages:?}");
    };
    assert_eq!(lifted["stagedActionIds"], json!([0, 3, 4]));
    assert_eq!(
        lifted["committedState"],
        json!({"counter": {"state": {"value": 2}}})
    );
    assert_eq!(counter_value(&manager), Some(3));
}

#[test]
fn malformed_and_remote_actions_are_reported_not_fatal() {
    let manager = counter_manager();
    let mut inspector = Inspector::attach(&manager);
    inspector.take();

    inspector
        .inbound
        .send("not json".to_string())
        .unwrap();
    inspector.send(json!({"type": "ACTION", "action": "{\"type\":\"x\"}"}));

    let messages = inspector.take();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|message| matches!(message, Outbound::Error { .. })));
    manager.dispatch(Arc::new(Increment)).unwrap();
    assert_eq!(counter_value(&manager), Some(1));
}

#[test]
fn disabled_devtools_leave_the_bridge_inert() {
    let manager = counter_manager();
    let options = DevtoolsOptions {
        enabled: false,
        ..DevtoolsOptions::default()
    };
    let mut inspector = Inspector::attach_with(&manager, &options);
    assert!(!inspector.bridge.is_connected());

    manager.dispatch(Arc::new(Increment)).unwrap();
    assert!(inspector.take().is_empty());
}

#[test]
fn bridge_without_connection_is_inert() {
    let manager = counter_manager();
    let mut bridge = DebugBridge::new(&manager, None, &DevtoolsOptions::default());
    assert!(!bridge.is_connected());
    bridge.drain();
    manager.dispatch(Arc::new(Increment)).unwrap();
    assert_eq!(counter_value(&manager), Some(1));
}

#[tokio::test]
async fn run_relays_until_the_inspector_disconnects() {
    let manager = counter_manager();
    let transcript = TranscriptChannel::new();
    let (connection, inbound) = InspectorConnection::with_sender(transcript.clone());
    let bridge = DebugBridge::new(&manager, Some(connection), &DevtoolsOptions::default());

    manager.dispatch(Arc::new(Increment)).unwrap();
    inbound.send(json!({"type": "START"}).to_string()).unwrap();
    inbound
        .send(json!({"type": "DISPATCH", "payload": {"type": "RESET"}}).to_string())
        .unwrap();
    drop(inbound);

    bridge.run().await;

    assert_eq!(counter_value(&manager), Some(0));
    let messages = transcript.messages();
    assert!(matches!(messages.first(), Some(Outbound::Init { .. })));
    assert!(matches!(messages.get(1), Some(Outbound::Send { action: Some(_), .. })));
    assert!(matches!(messages.last(), Some(Outbound::Init { .. })));
}
