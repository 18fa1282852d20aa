//! Persisted entities of the provisioning layer.
//!
//! `ComputeSetJob` and `ComputeSet` carry explicit state enums; transitions
//! of the job state machine are driven exclusively by the reconciler in
//! `server::reconcile`. `Compute::state` is deliberately *not* an enum: it is
//! the free-form activity string reported by the cluster-management
//! interface, an external observation this system compares against the
//! configured active marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ComputeSetId = u64;
pub type ComputeId = u64;
pub type ClusterId = u64;
pub type FrontendId = u64;

/// Scheduler-assigned job identifier, unique once submitted.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Submitted,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Queued => "queued",
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetState {
    Queued,
    Started,
    Completed,
}

impl std::fmt::Display for SetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SetState::Queued => "queued",
            SetState::Started => "started",
            SetState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// One scheduler submission backing a compute set.
///
/// `jobid` is `None` only for submissions that failed before the scheduler
/// assigned an identifier; such records exist so the failure is observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeSetJob {
    pub computeset: ComputeSetId,
    pub jobid: Option<JobId>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub account: Option<String>,
    pub node_count: Option<u32>,
    pub walltime_mins: Option<u32>,
    /// Scheduler-reported host set in compact notation; known only after
    /// placement.
    pub nodelist: Option<String>,
    pub state: JobState,
    pub error: Option<String>,
    pub created: DateTime<Utc>,
}

/// A logical grouping of compute nodes requested together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeSet {
    pub id: ComputeSetId,
    pub state: SetState,
    /// Member nodes, in request order.
    pub computes: Vec<ComputeId>,
    pub created: DateTime<Utc>,
}

/// One virtual compute node, owned by exactly one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compute {
    pub id: ComputeId,
    pub cluster: ClusterId,
    /// Management-interface identity; immutable once created.
    pub rocks_name: String,
    pub name: String,
    /// Free-form activity string reported by the management interface.
    pub state: String,
    pub memory: u64,
    pub cpus: u32,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A managed head node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontend {
    pub id: FrontendId,
    pub rocks_name: String,
    pub name: String,
    pub state: String,
    pub memory: u64,
    pub cpus: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub frontend: FrontendId,
    pub vlan: Option<u32>,
}

/// A network attachment of a frontend or compute node.
///
/// All fields together form the upsert key; an interface without a MAC
/// address is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interface {
    pub ip: Option<String>,
    pub netmask: Option<String>,
    pub mac: String,
    pub iface: String,
    pub subnet: Option<String>,
}
