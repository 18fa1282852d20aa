//! Task dispatch fabric contract.
//!
//! Components communicate exclusively by handing records to the fabric:
//! submission requests and their results, job state updates, power-control
//! batches and inventory snapshots. Delivery is fire-and-forget with
//! at-least-once semantics and no ordering guarantee between independently
//! dispatched tasks — consumers must tolerate redelivery and reordering.

use serde::{Deserialize, Serialize};

use crate::common::rpc::{RpcReceiver, RpcSender, make_rpc_queue};
use crate::model::{ComputeSetId, JobId, JobState};
use crate::server::inventory::FrontendSnapshot;

/// A compute-set-job submission request, consumed by the agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub computeset: ComputeSetId,
    pub user: String,
    pub account: String,
    pub node_count: u32,
    pub walltime_mins: u32,
}

/// A compute-set-job update record, consumed by the orchestrator role.
///
/// Partial records are valid: an external notification may carry only
/// `jobid` and `state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    pub computeset: ComputeSetId,
    pub jobid: Option<JobId>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub account: Option<String>,
    pub node_count: Option<u32>,
    pub walltime_mins: Option<u32>,
    pub nodelist: Option<String>,
    pub state: Option<JobState>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn new(computeset: ComputeSetId) -> Self {
        Self {
            computeset,
            jobid: None,
            name: None,
            user: None,
            account: None,
            node_count: None,
            walltime_mins: None,
            nodelist: None,
            state: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskMessage {
    SubmitJob(SubmitRequest),
    UpdateJob(JobUpdate),
    PowerOnNodes {
        nodes: Vec<String>,
        hosts: Vec<String>,
        iso: Option<String>,
    },
    PowerOffNodes {
        nodes: Vec<String>,
        action: String,
    },
    AttachIso {
        nodes: Vec<String>,
        iso: Option<String>,
    },
    MergeInventory {
        frontends: Vec<FrontendSnapshot>,
    },
}

/// Process role that consumes a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Frontend host with the scheduler and management CLIs, no store access.
    Agent,
    /// Store-owning host running the reconcilers.
    Orchestrator,
}

impl TaskMessage {
    pub fn role(&self) -> Role {
        match self {
            TaskMessage::SubmitJob(_)
            | TaskMessage::PowerOnNodes { .. }
            | TaskMessage::PowerOffNodes { .. }
            | TaskMessage::AttachIso { .. } => Role::Agent,
            TaskMessage::UpdateJob(_) | TaskMessage::MergeInventory { .. } => Role::Orchestrator,
        }
    }
}

/// Fire-and-forget hand-off of a task to its consuming role.
///
/// The caller never observes a result; failures of the task itself surface
/// only through persisted state.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, message: TaskMessage);
}

/// In-process fabric with one queue per role, for single-host deployments.
/// Cross-host deployments replace this behind [`Dispatcher`].
pub struct LocalFabric {
    agent: RpcSender<TaskMessage>,
    orchestrator: RpcSender<TaskMessage>,
}

impl LocalFabric {
    pub fn new() -> (
        Self,
        RpcReceiver<TaskMessage>,
        RpcReceiver<TaskMessage>,
    ) {
        let (agent, agent_rx) = make_rpc_queue();
        let (orchestrator, orchestrator_rx) = make_rpc_queue();
        (
            Self {
                agent,
                orchestrator,
            },
            agent_rx,
            orchestrator_rx,
        )
    }
}

impl Dispatcher for LocalFabric {
    fn dispatch(&self, message: TaskMessage) {
        let queue = match message.role() {
            Role::Agent => &self.agent,
            Role::Orchestrator => &self.orchestrator,
        };
        if queue.send(message).is_err() {
            log::warn!("Task dropped, the consuming role has shut down");
        }
    }
}
