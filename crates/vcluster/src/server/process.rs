//! Event loops of the two process roles.
//!
//! The orchestrator owns the store and reacts to fabric tasks and the
//! periodic inventory tick; the agent executes scheduler and management
//! commands on a frontend host. The roles share nothing but the fabric —
//! tasks cross the boundary, in-process state never does.

use std::sync::Arc;
use std::time::Duration;

use crate::common::rpc::RpcReceiver;
use crate::exec::CommandExecutor;
use crate::fabric::{Dispatcher, TaskMessage};
use crate::server::gateway::submit_job;
use crate::server::inventory::{SnapshotSource, merge_snapshot};
use crate::server::power::PowerController;
use crate::server::reconcile::apply_job_update;
use crate::store::Store;

/// Store-owning role: reconciles job updates and merges fleet snapshots,
/// pushed through the fabric or collected periodically from `source`.
pub async fn orchestrator_process(
    store: Arc<dyn Store>,
    fabric: Arc<dyn Dispatcher>,
    source: Option<Box<dyn SnapshotSource>>,
    refresh_interval: Duration,
    mut receiver: RpcReceiver<TaskMessage>,
) {
    let mut refresh = tokio::time::interval(refresh_interval);
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Some(source) = &source {
                    match source.collect().await {
                        Ok(frontends) => merge_snapshot(&*store, &frontends),
                        Err(error) => log::error!("Inventory collection failed: {error:?}"),
                    }
                }
            }
            message = receiver.recv() => {
                let Some(message) = message else { break };
                handle_orchestrator_task(&*store, &*fabric, message);
            }
        }
    }
    log::debug!("Orchestrator loop ended");
}

fn handle_orchestrator_task(store: &dyn Store, fabric: &dyn Dispatcher, message: TaskMessage) {
    match message {
        TaskMessage::UpdateJob(update) => {
            if let Err(error) = apply_job_update(store, fabric, update) {
                log::error!("Dropping job update: {error:?}");
            }
        }
        TaskMessage::MergeInventory { frontends } => merge_snapshot(store, &frontends),
        other => log::warn!("Task {other:?} is not handled by the orchestrator role"),
    }
}

/// Frontend-agent role: executes scheduler submissions and power-control
/// batches. Failures are logged and never retried here — the fabric contract
/// has no result channel, and failure observation goes through persisted
/// state.
pub async fn agent_process(
    executor: Arc<dyn CommandExecutor>,
    fabric: Arc<dyn Dispatcher>,
    mut receiver: RpcReceiver<TaskMessage>,
) {
    while let Some(message) = receiver.recv().await {
        handle_agent_task(&*executor, &*fabric, message).await;
    }
    log::debug!("Agent loop ended");
}

async fn handle_agent_task(
    executor: &dyn CommandExecutor,
    fabric: &dyn Dispatcher,
    message: TaskMessage,
) {
    match message {
        TaskMessage::SubmitJob(request) => submit_job(executor, fabric, request).await,
        TaskMessage::PowerOnNodes { nodes, hosts, iso } => {
            let power = PowerController::new(executor);
            if let Err(error) = power
                .power_on_with_binding(&nodes, &hosts, iso.as_deref())
                .await
            {
                log::error!("Power-on of {} node(s) failed: {error:?}", nodes.len());
            }
        }
        TaskMessage::PowerOffNodes { nodes, action } => {
            let power = PowerController::new(executor);
            if let Err(error) = power.power_off(&nodes, &action).await {
                log::error!("Power-off of {} node(s) failed: {error:?}", nodes.len());
            }
        }
        TaskMessage::AttachIso { nodes, iso } => {
            let power = PowerController::new(executor);
            if let Err(error) = power.attach_iso(&nodes, iso.as_deref()).await {
                log::error!("Boot media update of {} node(s) failed: {error:?}", nodes.len());
            }
        }
        other => log::warn!("Task {other:?} is not handled by the agent role"),
    }
}

#[cfg(test)]
mod tests {
    use super::{handle_agent_task, handle_orchestrator_task};
    use crate::fabric::{SubmitRequest, TaskMessage};
    use crate::model::JobState;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;
    use crate::tests::utils::{MockExecutor, RecordingDispatcher, seed_compute_set};

    /// Drive one compute set through submission, start and completion by
    /// pumping tasks between the two roles by hand.
    #[tokio::test]
    async fn test_job_lifecycle_across_roles() {
        let store = MemoryStore::new();
        let (set, names) = seed_compute_set(&store, 2);
        let executor = MockExecutor::new();
        executor.push_output(0, "555\n", "");
        let fabric = RecordingDispatcher::new();

        // Agent: submit the scheduler job.
        handle_agent_task(
            &executor,
            &fabric,
            TaskMessage::SubmitJob(SubmitRequest {
                computeset: set.id,
                user: "alice".to_string(),
                account: "csd123".to_string(),
                node_count: 2,
                walltime_mins: 30,
            }),
        )
        .await;
        let update = fabric.take();
        assert_eq!(update.len(), 1);

        // Orchestrator: persist the submission result.
        handle_orchestrator_task(&store, &fabric, update.into_iter().next().unwrap());
        assert_eq!(store.job("555").unwrap().state, JobState::Submitted);

        // Orchestrator: the scheduler reports the job running.
        let mut running = crate::fabric::JobUpdate::new(set.id);
        running.jobid = Some("555".to_string());
        running.state = Some(JobState::Running);
        running.nodelist = Some("host-[01-02]".to_string());
        handle_orchestrator_task(&store, &fabric, TaskMessage::UpdateJob(running));

        let tasks = fabric.take();
        assert_eq!(tasks.len(), 1);
        match &tasks[0] {
            TaskMessage::PowerOnNodes { nodes, hosts, .. } => {
                assert_eq!(nodes, &names);
                assert_eq!(hosts, &["host-01", "host-02"]);
            }
            other => panic!("Unexpected task {other:?}"),
        }

        // Agent: execute the bound power-on batch.
        handle_agent_task(&executor, &fabric, tasks.into_iter().next().unwrap()).await;
        let calls = executor.calls();
        // sbatch, two bindings, one batched start.
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3][..4], ["/opt/rocks/bin/rocks", "start", "host", "vm"]);

        // Orchestrator: completion powers the members off.
        let mut completed = crate::fabric::JobUpdate::new(set.id);
        completed.jobid = Some("555".to_string());
        completed.state = Some(JobState::Completed);
        handle_orchestrator_task(&store, &fabric, TaskMessage::UpdateJob(completed));

        let tasks = fabric.take();
        assert_eq!(tasks.len(), 1);
        assert!(matches!(
            &tasks[0],
            TaskMessage::PowerOffNodes { action, .. } if action == "shutdown"
        ));
    }

    #[tokio::test]
    async fn test_agent_logs_and_survives_power_failures() {
        let executor = MockExecutor::new();
        executor.push_output(1, "", "unreachable");
        let fabric = RecordingDispatcher::new();

        handle_agent_task(
            &executor,
            &fabric,
            TaskMessage::PowerOffNodes {
                nodes: vec!["vm-1".to_string()],
                action: "shutdown".to_string(),
            },
        )
        .await;

        // The failure is terminal for the batch; nothing is redispatched.
        assert!(fabric.take().is_empty());
    }

    #[test]
    fn test_orchestrator_drops_orphaned_updates() {
        let store = MemoryStore::new();
        let fabric = RecordingDispatcher::new();

        let mut update = crate::fabric::JobUpdate::new(404);
        update.jobid = Some("1".to_string());
        update.state = Some(JobState::Running);
        handle_orchestrator_task(&store, &fabric, TaskMessage::UpdateJob(update));

        assert!(store.job("1").is_none());
        assert!(fabric.take().is_empty());
    }
}
