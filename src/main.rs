//! `canopy` demo binary.
//!
//! # Commands
//! - `canopy demo` - run a small counter/todo tree with an in-memory inspector
//! - `canopy config` - print the resolved options

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use canopy::devtools::{DebugBridge, InspectorConnection, TranscriptChannel};
use canopy::{
    normalize, telemetry, Action, ActionKind, ActionSpec, Assign, CanopyOptions, ModuleConfig,
    ReduceError, Registry, State, StateManager, Store,
};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about = "Hierarchical action-driven state tree")]
struct Cli {
    /// Options file (default: ~/.config/canopy/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a few actions and print the inspector transcript
    Demo {
        /// Number of increments to dispatch
        #[arg(short, long, default_value_t = 3)]
        steps: u32,

        /// Todo items to add
        #[arg(short, long)]
        todo: Vec<String>,

        /// Action id to skip through the inspector after dispatching
        #[arg(long)]
        toggle: Option<u64>,
    },

    /// Print the resolved options
    Config,
}

const INCREMENT: ActionKind = ActionKind::new("[counter] Increment");
const ADD_TODO: ActionKind = ActionKind::new("[todos] Add");

struct Increment;

impl Action for Increment {
    fn kind(&self) -> ActionKind {
        INCREMENT
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        let value = state.get("value").and_then(State::as_i64).unwrap_or(0);
        Ok(state.with("value", State::from(value + 1)))
    }
}

struct AddTodo(String);

impl Action for AddTodo {
    fn kind(&self) -> ActionKind {
        ADD_TODO
    }

    fn label(&self) -> String {
        format!("{} {}", ADD_TODO, self.0)
    }

    fn reduce(&self, state: &State) -> Result<State, ReduceError> {
        let mut items = state.as_list().map(<[State]>::to_vec).unwrap_or_default();
        items.push(State::from(self.0.as_str()));
        Ok(State::from(items))
    }
}

fn registry() -> Registry {
    Registry::new()
        .register(ModuleConfig::new("app").children(["counter", "todos"]))
        .register(
            ModuleConfig::new("counter")
                .actions(ActionSpec::kinds([INCREMENT, Assign::KIND]))
                .initial_state(json!({"value": 0}))
                .accepts([INCREMENT]),
        )
        .register(
            ModuleConfig::new("todos")
                .actions(ActionSpec::keys([("items", ActionSpec::kinds([ADD_TODO]))]))
                .initial_state(json!({"items": []})),
        )
}

fn load_options(path: Option<&PathBuf>) -> Result<CanopyOptions> {
    match path {
        Some(path) => CanopyOptions::load_from(path)
            .with_context(|| format!("loading options from {}", path.display())),
        None => CanopyOptions::load().context("loading default options"),
    }
}

fn run_demo(
    options: &CanopyOptions,
    steps: u32,
    todos: Vec<String>,
    toggle: Option<u64>,
) -> Result<()> {
    let manager = StateManager::from_registry(&registry()).context("building module tree")?;

    let transcript = TranscriptChannel::new();
    let (connection, inspector) = InspectorConnection::with_sender(transcript.clone());
    let mut bridge = DebugBridge::new(&manager, Some(connection), &options.devtools);

    manager.initialize().context("initializing state tree")?;
    inspector
        .send(json!({"type": "START"}).to_string())
        .context("inspector channel closed")?;
    bridge.drain();

    let counter = Store::new(&manager, "counter")?;
    let todo_store = Store::new(&manager, "todos")?;
    for _ in 0..steps {
        counter.dispatch(Increment)?;
    }
    for item in todos {
        todo_store.dispatch(AddTodo(item))?;
    }
    bridge.drain();

    if let Some(id) = toggle {
        inspector
            .send(
                json!({"type": "DISPATCH", "payload": {"type": "TOGGLE_ACTION", "id": id}})
                    .to_string(),
            )
            .context("inspector channel closed")?;
        bridge.drain();
    }

    for message in transcript.take() {
        println!("{}", serde_json::to_string(&message)?);
    }
    println!("{}", serde_json::to_string_pretty(&normalize(&manager))?);
    Ok(())
}

fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let options = load_options(cli.config.as_ref())?;

    match cli.command {
        Commands::Demo {
            steps,
            todo,
            toggle,
        } => run_demo(&options, steps, todo, toggle),
        Commands::Config => {
            println!("# {}", CanopyOptions::config_path().display());
            print!("{}", toml::to_string_pretty(&options)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn demo_tree_builds() {
        let manager = StateManager::from_registry(&registry()).unwrap();
        manager.initialize().unwrap();
        manager.dispatch(Arc::new(AddTodo("milk".into()))).unwrap();
        assert_eq!(
            normalize(&manager).to_json(),
            json!({
                "counter": {"state": {"value": 0}},
                "todos": {"state": {"items": ["milk"]}}
            })
        );
    }
}
