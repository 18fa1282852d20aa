//! Idempotent power-state and boot-media operations against named nodes,
//! driven through the cluster-management command interface.
//!
//! Every operation is a single management call per batch; a partial failure
//! inside a batch is only observable through the aggregate exit code and
//! output.

use crate::common::error::VcError;
use crate::exec::{CommandExecutor, CommandOutput, check_output};
use crate::server::config;

pub struct PowerController<'a> {
    executor: &'a dyn CommandExecutor,
    rocks: String,
}

impl<'a> PowerController<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            rocks: config::rocks_path(),
        }
    }

    fn command(&self, prefix: &[&str], nodes: &[String], suffix: Option<String>) -> Vec<String> {
        let mut argv = vec![self.rocks.clone()];
        argv.extend(prefix.iter().map(|part| part.to_string()));
        argv.extend(nodes.iter().cloned());
        argv.extend(suffix);
        argv
    }

    /// Power on all listed nodes in one management call.
    pub async fn power_on(&self, nodes: &[String]) -> crate::Result<CommandOutput> {
        let argv = self.command(&["start", "host", "vm"], nodes, None);
        check_output(self.executor.run(argv).await?)
    }

    /// Bind each node to its physical execution host, optionally attach boot
    /// media, then power on the whole batch.
    ///
    /// An empty `hosts` list skips binding; a non-empty list must pair up
    /// with `nodes` exactly, checked before any command runs. A binding or
    /// media failure aborts the operation before power-on.
    pub async fn power_on_with_binding(
        &self,
        nodes: &[String],
        hosts: &[String],
        iso: Option<&str>,
    ) -> crate::Result<CommandOutput> {
        if !hosts.is_empty() && hosts.len() != nodes.len() {
            return Err(VcError::Validation(format!(
                "Host list length {} does not match node list length {}",
                hosts.len(),
                nodes.len()
            )));
        }
        for (node, host) in nodes.iter().zip(hosts) {
            let argv = self.command(
                &["set", "host", "vm"],
                std::slice::from_ref(node),
                Some(format!("physnode={host}")),
            );
            check_output(self.executor.run(argv).await?)?;
        }
        if iso.is_some() {
            self.attach_iso(nodes, iso).await?;
        }
        self.power_on(nodes).await
    }

    /// Stop all listed nodes in one management call, tagging the stop with
    /// the caller-supplied action label.
    pub async fn power_off(&self, nodes: &[String], action: &str) -> crate::Result<CommandOutput> {
        let argv = self.command(&["stop", "host", "vm"], nodes, Some(format!("action={action}")));
        check_output(self.executor.run(argv).await?)
    }

    /// Set the boot media of all listed nodes: `Some` attaches the named
    /// image from the media directory, `None` detaches explicitly.
    pub async fn attach_iso(
        &self,
        nodes: &[String],
        iso: Option<&str>,
    ) -> crate::Result<CommandOutput> {
        let cdrom = match iso {
            Some(iso) => format!("cdrom={}/{}", config::isos_dir(), iso),
            None => "cdrom=none".to_string(),
        };
        let argv = self.command(&["set", "host", "vm", "cdrom"], nodes, Some(cdrom));
        check_output(self.executor.run(argv).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::PowerController;
    use crate::common::error::VcError;
    use crate::tests::utils::MockExecutor;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn test_power_on_is_one_batched_call() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        power.power_on(&nodes(&["vm-1", "vm-2"])).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![vec![
                "/opt/rocks/bin/rocks",
                "start",
                "host",
                "vm",
                "vm-1",
                "vm-2"
            ]]
        );
    }

    #[tokio::test]
    async fn test_power_off_carries_action_tag() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        power
            .power_off(&nodes(&["vm-1", "vm-2"]), "shutdown")
            .await
            .unwrap();

        assert_eq!(
            executor.calls(),
            vec![vec![
                "/opt/rocks/bin/rocks",
                "stop",
                "host",
                "vm",
                "vm-1",
                "vm-2",
                "action=shutdown"
            ]]
        );
    }

    #[tokio::test]
    async fn test_binding_length_mismatch_runs_nothing() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        let error = power
            .power_on_with_binding(&nodes(&["vm-1", "vm-2"]), &nodes(&["host-1"]), None)
            .await
            .unwrap_err();

        assert!(matches!(error, VcError::Validation(_)));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_binding_pairs_then_powers_on() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        power
            .power_on_with_binding(
                &nodes(&["vm-1", "vm-2"]),
                &nodes(&["host-3", "host-4"]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            executor.calls(),
            vec![
                vec![
                    "/opt/rocks/bin/rocks",
                    "set",
                    "host",
                    "vm",
                    "vm-1",
                    "physnode=host-3"
                ],
                vec![
                    "/opt/rocks/bin/rocks",
                    "set",
                    "host",
                    "vm",
                    "vm-2",
                    "physnode=host-4"
                ],
                vec!["/opt/rocks/bin/rocks", "start", "host", "vm", "vm-1", "vm-2"],
            ]
        );
    }

    #[tokio::test]
    async fn test_attach_failure_aborts_power_on() {
        let executor = MockExecutor::new();
        executor.push_output(1, "", "no such image");
        let power = PowerController::new(&executor);

        let error = power
            .power_on_with_binding(&nodes(&["vm-1"]), &[], Some("missing.iso"))
            .await
            .unwrap_err();

        assert!(matches!(error, VcError::Failed { .. }));
        // Only the media call ran; no power-on was attempted.
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_iso_builds_media_path() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        power
            .attach_iso(&nodes(&["vm-1", "vm-2"]), Some("rescue.iso"))
            .await
            .unwrap();

        assert_eq!(
            executor.calls(),
            vec![vec![
                "/opt/rocks/bin/rocks",
                "set",
                "host",
                "vm",
                "cdrom",
                "vm-1",
                "vm-2",
                "cdrom=/mnt/images/rescue.iso"
            ]]
        );
    }

    #[tokio::test]
    async fn test_attach_iso_none_detaches() {
        let executor = MockExecutor::new();
        let power = PowerController::new(&executor);

        power.attach_iso(&nodes(&["vm-1"]), None).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].last().unwrap(), "cdrom=none");
    }

    #[tokio::test]
    async fn test_power_on_failure_carries_output() {
        let executor = MockExecutor::new();
        executor.push_output(1, "partial start", "vm-2 unreachable");
        let power = PowerController::new(&executor);

        let error = power.power_on(&nodes(&["vm-1", "vm-2"])).await.unwrap_err();

        match error {
            VcError::Failed { code, output } => {
                assert_eq!(code, 1);
                assert!(output.contains("partial start"));
                assert!(output.contains("vm-2 unreachable"));
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }
}
