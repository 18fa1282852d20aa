//! Narrow persistence contract consumed by the reconcilers.
//!
//! The store is mutated only by the job state reconciler and the inventory
//! reconciler; the submission gateway and the power controller never receive
//! a handle. Implementations must serialize concurrent handling of updates
//! for the same record key — the reconcilers rely on read-then-conditional-
//! write correctness.

pub mod memory;

use crate::model::{
    Cluster, ClusterId, Compute, ComputeId, ComputeSet, ComputeSetId, ComputeSetJob, Frontend,
    FrontendId, Interface, JobState, SetState,
};

/// Creation defaults for [`ComputeSetJob::get_or_create`]-style upserts.
/// Optional fields are applied only when present — partial records are valid.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub name: Option<String>,
    pub user: Option<String>,
    pub account: Option<String>,
    pub node_count: Option<u32>,
    pub walltime_mins: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFrontend {
    pub rocks_name: String,
    pub name: String,
    pub state: String,
    pub memory: u64,
    pub cpus: u32,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct NewCompute {
    pub name: String,
    pub state: String,
    pub memory: u64,
    pub cpus: u32,
    pub kind: String,
}

pub trait Store: Send + Sync {
    // Compute sets
    fn compute_set(&self, id: ComputeSetId) -> Option<ComputeSet>;
    fn create_compute_set(&self, computes: &[ComputeId]) -> ComputeSet;
    fn set_compute_set_state(&self, id: ComputeSetId, state: SetState);
    /// Find the compute set containing the given node whose state is in
    /// `states`. At most one is expected; the first match is returned.
    fn compute_set_for_compute(&self, compute: ComputeId, states: &[SetState])
    -> Option<ComputeSet>;
    /// Member nodes of a compute set, in member order. Empty if the set is
    /// unknown.
    fn computes_of_set(&self, id: ComputeSetId) -> Vec<Compute>;

    // Compute set jobs
    /// Look up or create the job record. A `Some` jobid matches globally; a
    /// `None` jobid matches the jobid-less record of the given compute set
    /// only. Returns the record and whether it was created.
    fn get_or_create_job(
        &self,
        computeset: ComputeSetId,
        jobid: Option<&str>,
        state: JobState,
        defaults: NewJob,
    ) -> (ComputeSetJob, bool);
    fn job(&self, jobid: &str) -> Option<ComputeSetJob>;
    fn save_job(&self, job: &ComputeSetJob);

    // Fleet inventory
    fn cluster_by_frontend(&self, rocks_name: &str) -> Option<(Cluster, Frontend)>;
    fn create_frontend_cluster(
        &self,
        frontend: NewFrontend,
        vlan: Option<u32>,
    ) -> (Cluster, Frontend);
    fn save_frontend(&self, frontend: &Frontend);
    fn save_cluster(&self, cluster: &Cluster);
    fn get_or_create_compute(
        &self,
        cluster: ClusterId,
        rocks_name: &str,
        defaults: NewCompute,
    ) -> (Compute, bool);
    fn save_compute(&self, compute: &Compute);
    /// Insert the interface unless an identical record already exists for the
    /// owner. Returns whether a record was created.
    fn upsert_frontend_interface(&self, frontend: FrontendId, interface: Interface) -> bool;
    fn upsert_compute_interface(&self, compute: ComputeId, interface: Interface) -> bool;
}
