//! In-memory store implementation.
//!
//! One mutex guards the whole entity set, which makes every trait method an
//! atomic read-then-write step. Every mutation increments a write counter so
//! tests can assert that reconciliation of unchanged input performs zero
//! writes.

use std::sync::Mutex;

use chrono::Utc;

use crate::Map;
use crate::model::{
    Cluster, ClusterId, Compute, ComputeId, ComputeSet, ComputeSetId, ComputeSetJob, Frontend,
    FrontendId, Interface, JobState, SetState,
};
use crate::store::{NewCompute, NewFrontend, NewJob, Store};

#[derive(Default)]
struct Inner {
    id_counter: u64,
    compute_sets: Map<ComputeSetId, ComputeSet>,
    jobs: Vec<ComputeSetJob>,
    clusters: Map<ClusterId, Cluster>,
    frontends: Map<FrontendId, Frontend>,
    computes: Map<ComputeId, Compute>,
    frontend_interfaces: Map<FrontendId, Vec<Interface>>,
    compute_interfaces: Map<ComputeId, Vec<Interface>>,
    writes: u64,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.id_counter += 1;
        self.id_counter
    }

    fn record_write(&mut self) {
        self.writes += 1;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of record writes performed so far.
    pub fn writes(&self) -> u64 {
        self.inner.lock().unwrap().writes
    }

    pub fn compute(&self, id: ComputeId) -> Option<Compute> {
        self.inner.lock().unwrap().computes.get(&id).cloned()
    }

    pub fn frontend_interfaces(&self, id: FrontendId) -> Vec<Interface> {
        self.inner
            .lock()
            .unwrap()
            .frontend_interfaces
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn compute_interfaces(&self, id: ComputeId) -> Vec<Interface> {
        self.inner
            .lock()
            .unwrap()
            .compute_interfaces
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Job records of a compute set, including jobid-less failure records.
    pub fn jobs_of_set(&self, id: ComputeSetId) -> Vec<ComputeSetJob> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|job| job.computeset == id)
            .cloned()
            .collect()
    }
}

fn upsert_interface(
    interfaces: &mut Map<u64, Vec<Interface>>,
    owner: u64,
    interface: Interface,
) -> bool {
    let owned = interfaces.entry(owner).or_default();
    if owned.contains(&interface) {
        return false;
    }
    owned.push(interface);
    true
}

impl Store for MemoryStore {
    fn compute_set(&self, id: ComputeSetId) -> Option<ComputeSet> {
        self.inner.lock().unwrap().compute_sets.get(&id).cloned()
    }

    fn create_compute_set(&self, computes: &[ComputeId]) -> ComputeSet {
        let mut inner = self.inner.lock().unwrap();
        let set = ComputeSet {
            id: inner.next_id(),
            state: SetState::Queued,
            computes: computes.to_vec(),
            created: Utc::now(),
        };
        inner.compute_sets.insert(set.id, set.clone());
        inner.record_write();
        set
    }

    fn set_compute_set_state(&self, id: ComputeSetId, state: SetState) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(set) = inner.compute_sets.get_mut(&id) {
            set.state = state;
            inner.record_write();
        }
    }

    fn compute_set_for_compute(
        &self,
        compute: ComputeId,
        states: &[SetState],
    ) -> Option<ComputeSet> {
        let inner = self.inner.lock().unwrap();
        inner
            .compute_sets
            .values()
            .find(|set| states.contains(&set.state) && set.computes.contains(&compute))
            .cloned()
    }

    fn computes_of_set(&self, id: ComputeSetId) -> Vec<Compute> {
        let inner = self.inner.lock().unwrap();
        let Some(set) = inner.compute_sets.get(&id) else {
            return Vec::new();
        };
        set.computes
            .iter()
            .filter_map(|compute| inner.computes.get(compute).cloned())
            .collect()
    }

    fn get_or_create_job(
        &self,
        computeset: ComputeSetId,
        jobid: Option<&str>,
        state: JobState,
        defaults: NewJob,
    ) -> (ComputeSetJob, bool) {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.jobs.iter().find(|job| match jobid {
            Some(jobid) => job.jobid.as_deref() == Some(jobid),
            None => job.computeset == computeset && job.jobid.is_none(),
        });
        if let Some(job) = existing {
            return (job.clone(), false);
        }
        let job = ComputeSetJob {
            computeset,
            jobid: jobid.map(|id| id.to_string()),
            name: defaults.name,
            user: defaults.user,
            account: defaults.account,
            node_count: defaults.node_count,
            walltime_mins: defaults.walltime_mins,
            nodelist: None,
            state,
            error: defaults.error,
            created: Utc::now(),
        };
        inner.jobs.push(job.clone());
        inner.record_write();
        (job, true)
    }

    fn job(&self, jobid: &str) -> Option<ComputeSetJob> {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|job| job.jobid.as_deref() == Some(jobid))
            .cloned()
    }

    fn save_job(&self, job: &ComputeSetJob) {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.jobs.iter_mut().find(|other| match &job.jobid {
            Some(jobid) => other.jobid.as_deref() == Some(jobid),
            None => other.computeset == job.computeset && other.jobid.is_none(),
        });
        if let Some(existing) = existing {
            *existing = job.clone();
            inner.record_write();
        }
    }

    fn cluster_by_frontend(&self, rocks_name: &str) -> Option<(Cluster, Frontend)> {
        let inner = self.inner.lock().unwrap();
        let frontend = inner
            .frontends
            .values()
            .find(|frontend| frontend.rocks_name == rocks_name)?;
        let cluster = inner
            .clusters
            .values()
            .find(|cluster| cluster.frontend == frontend.id)?;
        Some((cluster.clone(), frontend.clone()))
    }

    fn create_frontend_cluster(
        &self,
        frontend: NewFrontend,
        vlan: Option<u32>,
    ) -> (Cluster, Frontend) {
        let mut inner = self.inner.lock().unwrap();
        let frontend = Frontend {
            id: inner.next_id(),
            name: frontend.name,
            rocks_name: frontend.rocks_name,
            state: frontend.state,
            memory: frontend.memory,
            cpus: frontend.cpus,
            kind: frontend.kind,
            created: Utc::now(),
        };
        let cluster = Cluster {
            id: inner.next_id(),
            name: frontend.rocks_name.clone(),
            frontend: frontend.id,
            vlan,
        };
        inner.frontends.insert(frontend.id, frontend.clone());
        inner.clusters.insert(cluster.id, cluster.clone());
        inner.record_write();
        (cluster, frontend)
    }

    fn save_frontend(&self, frontend: &Frontend) {
        let mut inner = self.inner.lock().unwrap();
        if inner.frontends.contains_key(&frontend.id) {
            inner.frontends.insert(frontend.id, frontend.clone());
            inner.record_write();
        }
    }

    fn save_cluster(&self, cluster: &Cluster) {
        let mut inner = self.inner.lock().unwrap();
        if inner.clusters.contains_key(&cluster.id) {
            inner.clusters.insert(cluster.id, cluster.clone());
            inner.record_write();
        }
    }

    fn get_or_create_compute(
        &self,
        cluster: ClusterId,
        rocks_name: &str,
        defaults: NewCompute,
    ) -> (Compute, bool) {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .computes
            .values()
            .find(|compute| compute.cluster == cluster && compute.rocks_name == rocks_name);
        if let Some(compute) = existing {
            return (compute.clone(), false);
        }
        let compute = Compute {
            id: inner.next_id(),
            cluster,
            rocks_name: rocks_name.to_string(),
            name: defaults.name,
            state: defaults.state,
            memory: defaults.memory,
            cpus: defaults.cpus,
            kind: defaults.kind,
        };
        inner.computes.insert(compute.id, compute.clone());
        inner.record_write();
        (compute, true)
    }

    fn save_compute(&self, compute: &Compute) {
        let mut inner = self.inner.lock().unwrap();
        if inner.computes.contains_key(&compute.id) {
            inner.computes.insert(compute.id, compute.clone());
            inner.record_write();
        }
    }

    fn upsert_frontend_interface(&self, frontend: FrontendId, interface: Interface) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let created = upsert_interface(&mut inner.frontend_interfaces, frontend, interface);
        if created {
            inner.record_write();
        }
        created
    }

    fn upsert_compute_interface(&self, compute: ComputeId, interface: Interface) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let created = upsert_interface(&mut inner.compute_interfaces, compute, interface);
        if created {
            inner.record_write();
        }
        created
    }
}
