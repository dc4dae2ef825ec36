//! Hierarchical, action-driven state container.
//!
//! Modules declare children, a reducer (or an action spec composed into
//! one) and an optional initial state. A [`StateManager`] materializes the
//! module tree once, and every dispatched action visits every node in
//! pre-order. [`Store`] handles read one node and dispatch to the whole tree.
//! [`normalize`] and [`denormalize`] convert the tree to and from a JSON
//! snapshot, which the [`devtools::DebugBridge`] uses for time travel.

pub mod action;
pub mod config;
pub mod devtools;
pub mod engine;
pub mod normalize;
pub mod reducer;
pub mod state;
pub mod store;
pub mod telemetry;

pub use action::{Action, ActionKind, Assign, Initialize, ReduceError, SharedAction};
pub use config::{CanopyOptions, ConfigError, DevtoolsOptions, ModuleConfig, ModuleId, Registry};
pub use engine::{
    DispatchError, DispatchRecord, DispatchReport, StateChange, StateManager, Subscription,
};
pub use normalize::{denormalize, normalize, Snapshot};
pub use reducer::{compose, ActionSpec, KindRule, Reducer};
pub use state::{State, StateMap};
pub use store::{Store, StoreError};
