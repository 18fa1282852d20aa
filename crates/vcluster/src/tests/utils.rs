//! Shared test doubles and fixtures.

use std::collections::VecDeque;
use std::sync::Mutex;

use derive_builder::Builder;

use crate::exec::{CommandExecutor, CommandOutput, ExecFuture};
use crate::fabric::{Dispatcher, TaskMessage};
use crate::model::ComputeSet;
use crate::server::inventory::ComputeSnapshot;
use crate::store::memory::MemoryStore;
use crate::store::{NewCompute, NewFrontend, Store};

/// Command executor that records every call and replays scripted responses.
/// When the script runs out, calls succeed with empty output.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<crate::Result<CommandOutput>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, code: i32, stdout: &str, stderr: &str) {
        self.responses.lock().unwrap().push_back(Ok(CommandOutput {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }));
    }

    /// The next call fails as if the binary could not be launched at all.
    pub fn push_launch_failure(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )
            .into()));
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for MockExecutor {
    fn run(&self, argv: Vec<String>) -> ExecFuture {
        self.calls.lock().unwrap().push(argv);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(CommandOutput {
                code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }));
        Box::pin(async move { response })
    }
}

/// Dispatcher that records tasks instead of delivering them.
#[derive(Default)]
pub struct RecordingDispatcher {
    messages: Mutex<Vec<TaskMessage>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<TaskMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Drain the recorded tasks, e.g. to pump them into the next role.
    pub fn take(&self) -> Vec<TaskMessage> {
        std::mem::take(&mut self.messages.lock().unwrap())
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, message: TaskMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Compute-node fixture for snapshots and store seeding.
#[derive(Builder, Clone)]
#[builder(pattern = "owned", setter(into))]
pub struct NodeDef {
    pub name: String,
    #[builder(default = "\"down\".to_string()")]
    pub state: String,
    #[builder(default = "64")]
    pub mem: u64,
    #[builder(default = "24")]
    pub cpus: u32,
    #[builder(default = "\"compute\".to_string()")]
    pub kind: String,
}

impl NodeDef {
    pub fn snapshot(self) -> ComputeSnapshot {
        ComputeSnapshot {
            name: self.name,
            state: self.state,
            mem: self.mem,
            cpus: self.cpus,
            kind: self.kind,
            interfaces: vec![],
        }
    }

    pub fn defaults(self) -> NewCompute {
        NewCompute {
            name: self.name,
            state: self.state,
            memory: self.mem,
            cpus: self.cpus,
            kind: self.kind,
        }
    }
}

/// Seed a frontend `fe1` with `count` computes (`vm-1`..) and one compute
/// set owning all of them, in member order.
pub fn seed_compute_set(store: &MemoryStore, count: usize) -> (ComputeSet, Vec<String>) {
    let (cluster, _) = store.create_frontend_cluster(
        NewFrontend {
            rocks_name: "fe1".to_string(),
            name: "fe1".to_string(),
            state: "active".to_string(),
            memory: 128,
            cpus: 16,
            kind: "frontend".to_string(),
        },
        Some(100),
    );
    let names: Vec<String> = (1..=count).map(|index| format!("vm-{index}")).collect();
    let ids: Vec<_> = names
        .iter()
        .map(|name| {
            store
                .get_or_create_compute(
                    cluster.id,
                    name,
                    NodeDefBuilder::default()
                        .name(name.clone())
                        .build()
                        .unwrap()
                        .defaults(),
                )
                .0
                .id
        })
        .collect();
    let set = store.create_compute_set(&ids);
    (set, names)
}
