//! Fixed submission and power-control parameters, with environment
//! overrides for paths that differ between installations.

use std::time::Duration;

/// Wall-clock limit for the submission command itself (not the job); the
/// scheduler must accept or reject quickly, the job runs independently
/// afterwards.
pub const SUBMIT_TIMEOUT_SECS: u64 = 2;

/// Fixed per-task allocation requested for every compute-set job.
pub const CPUS_PER_TASK: u32 = 24;

/// Seconds before expiry at which the scheduler signals the job script
/// (`USR1`) so it can drain the virtual nodes before the hard stop.
pub const SIGNAL_LEAD_SECS: u32 = 60;

/// Working directory of the job script; its output file stays there on the
/// execution host.
pub const JOB_WORKDIR: &str = "/tmp";

/// Job script submitted for every compute set.
pub const JOB_SCRIPT: &str = "/etc/slurm/VC-JOB.run";

/// Node activity value reported by the management interface for a booted
/// node; drives compute-set aggregate transitions.
pub const ACTIVE_STATE: &str = "active";

/// Partition that receives compute-set jobs.
pub fn partition() -> String {
    std::env::var("VC_PARTITION").unwrap_or_else(|_| "virt".to_string())
}

pub fn timeout_path() -> String {
    std::env::var("VC_TIMEOUT_BIN").unwrap_or_else(|_| "/usr/bin/timeout".to_string())
}

pub fn sbatch_path() -> String {
    std::env::var("VC_SBATCH_BIN").unwrap_or_else(|_| "/usr/bin/sbatch".to_string())
}

/// Cluster-management tool driving node power state and boot media.
pub fn rocks_path() -> String {
    std::env::var("VC_ROCKS_BIN").unwrap_or_else(|_| "/opt/rocks/bin/rocks".to_string())
}

/// Directory holding boot media images.
pub fn isos_dir() -> String {
    std::env::var("VC_ISOS_DIR").unwrap_or_else(|_| "/mnt/images".to_string())
}

/// How often the orchestrator collects and merges a fleet snapshot.
pub fn inventory_refresh_interval() -> Duration {
    std::env::var("VC_INVENTORY_REFRESH_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_secs(60))
}
