//! Job state reconciler: the authoritative compute-set-job state machine.
//!
//! Update records arrive from the submission gateway and from external
//! state-change notifications, possibly out of order and more than once.
//! All writes go through an idempotent upsert, and side effects fire only
//! when the persisted state actually changes — a redelivered record whose
//! state equals the stored one is a no-op.

use crate::common::error::VcError;
use crate::common::hostlist::expand_hostlist;
use crate::fabric::{Dispatcher, JobUpdate, TaskMessage};
use crate::model::{ComputeSet, ComputeSetJob, JobState};
use crate::store::{NewJob, Store};

/// Side effect attached to a job state transition edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Bind the virtual nodes to their execution hosts and power them on.
    PowerOnBound,
    /// The job finished without ever being observed running. The host list
    /// is resolved for the record, but the nodes were never powered on by
    /// this flow, so no power-off is issued; the case is surfaced to
    /// operators instead.
    ReportOnly,
    /// Power the member nodes off.
    PowerOff,
}

/// Pure transition table of the job state machine, independent of how the
/// new state was learned (submission result, notification or polling).
pub fn transition_effect(old: JobState, new: JobState) -> Option<TransitionEffect> {
    match (old, new) {
        (JobState::Submitted, JobState::Running) => Some(TransitionEffect::PowerOnBound),
        (JobState::Submitted, JobState::Completed) => Some(TransitionEffect::ReportOnly),
        (JobState::Running, JobState::Completed) => Some(TransitionEffect::PowerOff),
        _ => None,
    }
}

/// Apply one update record: upsert the job, persist what the record carries,
/// and dispatch the side effect of the resulting transition, if any.
pub fn apply_job_update(
    store: &dyn Store,
    fabric: &dyn Dispatcher,
    update: JobUpdate,
) -> crate::Result<()> {
    let Some(set) = store.compute_set(update.computeset) else {
        return Err(VcError::NotFound(format!(
            "ComputeSet {} referenced by job update {:?} does not exist",
            update.computeset, update.jobid
        )));
    };

    let defaults = NewJob {
        name: update.name.clone(),
        user: update.user.clone(),
        account: update.account.clone(),
        node_count: update.node_count,
        walltime_mins: update.walltime_mins,
        error: update.error.clone(),
    };
    let (mut job, created) = store.get_or_create_job(
        update.computeset,
        update.jobid.as_deref(),
        update.state.unwrap_or(JobState::Queued),
        defaults,
    );
    if created {
        log::debug!(
            "Created job record {:?} for compute set {}",
            job.jobid,
            job.computeset
        );
    }

    // The nodelist only ever becomes known after scheduler placement.
    if let Some(nodelist) = &update.nodelist {
        job.nodelist = Some(nodelist.clone());
        store.save_job(&job);
    }

    let Some(new_state) = update.state else {
        return Ok(());
    };
    if job.state == new_state {
        return Ok(());
    }
    let old_state = job.state;
    job.state = new_state;
    if update.error.is_some() {
        job.error = update.error;
    }
    store.save_job(&job);
    log::info!("Job {:?} passed from {old_state} to {new_state}", job.jobid);

    match transition_effect(old_state, new_state) {
        Some(TransitionEffect::PowerOnBound) => power_on_members(store, fabric, &set, &job)?,
        Some(TransitionEffect::ReportOnly) => {
            if let Some(nodelist) = nonempty_nodelist(&job) {
                let hosts = expand_hostlist(nodelist)?;
                log::warn!(
                    "Job {:?} completed before it was observed running; hosts {hosts:?} \
                     were never claimed, no power-off issued",
                    job.jobid
                );
            }
        }
        Some(TransitionEffect::PowerOff) => {
            if nonempty_nodelist(&job).is_some() {
                let nodes = member_nodes(store, &set);
                fabric.dispatch(TaskMessage::PowerOffNodes {
                    nodes,
                    action: "shutdown".to_string(),
                });
            }
        }
        None => {}
    }
    Ok(())
}

/// Resolve the member nodes and their scheduler-assigned execution hosts,
/// then dispatch one bound power-on batch.
fn power_on_members(
    store: &dyn Store,
    fabric: &dyn Dispatcher,
    set: &ComputeSet,
    job: &ComputeSetJob,
) -> crate::Result<()> {
    let Some(nodelist) = nonempty_nodelist(job) else {
        return Ok(());
    };
    let nodes = member_nodes(store, set);
    let hosts = expand_hostlist(nodelist)?;
    if hosts.len() != nodes.len() {
        return Err(VcError::Validation(format!(
            "Job {:?} reports {} execution host(s) for {} member node(s)",
            job.jobid,
            hosts.len(),
            nodes.len()
        )));
    }
    // TODO: vlan and switchport configuration before power-on
    fabric.dispatch(TaskMessage::PowerOnNodes {
        nodes,
        hosts,
        iso: None,
    });
    Ok(())
}

/// Member node management identities, in member order — the order the
/// execution host list is zipped against.
fn member_nodes(store: &dyn Store, set: &ComputeSet) -> Vec<String> {
    store
        .computes_of_set(set.id)
        .into_iter()
        .map(|compute| compute.rocks_name)
        .collect()
}

fn nonempty_nodelist(job: &ComputeSetJob) -> Option<&str> {
    job.nodelist
        .as_deref()
        .filter(|nodelist| !nodelist.trim().is_empty())
}
