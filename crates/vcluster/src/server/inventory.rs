//! Cluster inventory reconciler.
//!
//! Periodically merges a point-in-time snapshot of the managed fleet
//! (frontends, compute nodes, interfaces) into the persisted inventory and
//! derives compute-set aggregate state from node activity. The merge is a
//! sequential walk over the snapshot; a single malformed record must not
//! abort the rest of it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::exec::{CommandExecutor, check_output};
use crate::model::{ClusterId, Compute, Interface, SetState};
use crate::server::config;
use crate::store::{NewCompute, NewFrontend, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    pub ip: Option<String>,
    pub netmask: Option<String>,
    /// Interfaces without a MAC address are never persisted.
    pub mac: Option<String>,
    pub iface: String,
    pub subnet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeSnapshot {
    pub name: String,
    pub state: String,
    pub mem: u64,
    pub cpus: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceSnapshot>,
}

/// One managed head node with its interfaces and compute nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendSnapshot {
    pub frontend: String,
    pub state: String,
    pub mem: u64,
    pub cpus: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub vlan: Option<u32>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceSnapshot>,
    #[serde(default)]
    pub computes: Vec<ComputeSnapshot>,
}

/// Merge one fleet snapshot into the store. Unchanged records are not
/// rewritten; re-merging an identical snapshot performs zero writes.
pub fn merge_snapshot(store: &dyn Store, frontends: &[FrontendSnapshot]) {
    for snapshot in frontends {
        merge_frontend(store, snapshot);
    }
}

fn merge_frontend(store: &dyn Store, snapshot: &FrontendSnapshot) {
    let (cluster, frontend) = match store.cluster_by_frontend(&snapshot.frontend) {
        Some((mut cluster, mut frontend)) => {
            if cluster.vlan != snapshot.vlan {
                cluster.vlan = snapshot.vlan;
                store.save_cluster(&cluster);
            }
            if frontend.state != snapshot.state
                || frontend.memory != snapshot.mem
                || frontend.cpus != snapshot.cpus
            {
                frontend.state = snapshot.state.clone();
                frontend.memory = snapshot.mem;
                frontend.cpus = snapshot.cpus;
                store.save_frontend(&frontend);
            }
            (cluster, frontend)
        }
        None => {
            log::info!("Discovered new frontend {}", snapshot.frontend);
            store.create_frontend_cluster(
                NewFrontend {
                    rocks_name: snapshot.frontend.clone(),
                    name: snapshot.frontend.clone(),
                    state: snapshot.state.clone(),
                    memory: snapshot.mem,
                    cpus: snapshot.cpus,
                    kind: snapshot.kind.clone(),
                },
                snapshot.vlan,
            )
        }
    };

    for interface in &snapshot.interfaces {
        if let Some(interface) = persisted_interface(interface) {
            store.upsert_frontend_interface(frontend.id, interface);
        }
    }

    for compute in &snapshot.computes {
        merge_compute(store, cluster.id, compute);
    }
}

fn merge_compute(store: &dyn Store, cluster: ClusterId, snapshot: &ComputeSnapshot) {
    let (mut compute, created) = store.get_or_create_compute(
        cluster,
        &snapshot.name,
        NewCompute {
            name: snapshot.name.clone(),
            state: snapshot.state.clone(),
            memory: snapshot.mem,
            cpus: snapshot.cpus,
            kind: snapshot.kind.clone(),
        },
    );
    if !created
        && (compute.state != snapshot.state
            || compute.memory != snapshot.mem
            || compute.cpus != snapshot.cpus)
    {
        compute.state = snapshot.state.clone();
        compute.memory = snapshot.mem;
        compute.cpus = snapshot.cpus;
        store.save_compute(&compute);
        if let Err(error) = refresh_compute_set_state(store, &compute) {
            log::error!(
                "Updating aggregate state for node {} failed: {error:?}",
                compute.name
            );
        }
    }

    for interface in &snapshot.interfaces {
        if let Some(interface) = persisted_interface(interface) {
            store.upsert_compute_interface(compute.id, interface);
        }
    }
}

fn persisted_interface(snapshot: &InterfaceSnapshot) -> Option<Interface> {
    let mac = snapshot.mac.clone()?;
    Some(Interface {
        ip: snapshot.ip.clone(),
        netmask: snapshot.netmask.clone(),
        mac,
        iface: snapshot.iface.clone(),
        subnet: snapshot.subnet.clone(),
    })
}

/// Advance the aggregate state of the compute set owning this node, if any.
/// Must run after the node's own state has been persisted, because the
/// completion check re-reads the member states.
fn refresh_compute_set_state(store: &dyn Store, compute: &Compute) -> anyhow::Result<()> {
    let Some(set) =
        store.compute_set_for_compute(compute.id, &[SetState::Queued, SetState::Started])
    else {
        // Nodes outside any active set are common.
        log::debug!("No active compute set for node {}", compute.name);
        return Ok(());
    };
    match set.state {
        SetState::Queued if compute.state == config::ACTIVE_STATE => {
            log::info!("Compute set {} started", set.id);
            store.set_compute_set_state(set.id, SetState::Started);
        }
        SetState::Started => {
            let members = store.computes_of_set(set.id);
            if members.is_empty() {
                anyhow::bail!(
                    "Compute set {} vanished while evaluating aggregate state",
                    set.id
                );
            }
            if !members
                .iter()
                .any(|member| member.state == config::ACTIVE_STATE)
            {
                log::info!("Compute set {} completed", set.id);
                store.set_compute_set_state(set.id, SetState::Completed);
            }
        }
        _ => {}
    }
    Ok(())
}

pub type SnapshotFuture = Pin<Box<dyn Future<Output = anyhow::Result<Vec<FrontendSnapshot>>>>>;

/// Produces the current fleet snapshot for the periodic merge.
pub trait SnapshotSource {
    fn collect(&self) -> SnapshotFuture;
}

/// Runs an external probe command and parses its stdout as a JSON snapshot.
pub struct CommandSnapshotSource {
    executor: Arc<dyn CommandExecutor>,
    argv: Vec<String>,
}

impl CommandSnapshotSource {
    pub fn new(executor: Arc<dyn CommandExecutor>, argv: Vec<String>) -> Self {
        Self { executor, argv }
    }
}

impl SnapshotSource for CommandSnapshotSource {
    fn collect(&self) -> SnapshotFuture {
        let future = self.executor.run(self.argv.clone());
        Box::pin(async move {
            let output = check_output(future.await?)?;
            let frontends = serde_json::from_str(&output.stdout)
                .context("Cannot parse inventory snapshot")?;
            Ok(frontends)
        })
    }
}
