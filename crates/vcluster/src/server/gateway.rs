//! Job submission gateway.
//!
//! Runs on a host that has the scheduler CLI but not necessarily the store;
//! its only output channel is an `UpdateJob` task dispatched back to the
//! reconciler. Exactly one submission attempt is made per request — a retry
//! here could create a duplicate scheduler job, so retrying is the caller's
//! decision.

use crate::exec::{CommandExecutor, check_output};
use crate::fabric::{Dispatcher, JobUpdate, SubmitRequest, TaskMessage};
use crate::model::{JobId, JobState};
use crate::server::config;

/// Synthesize a unique job name from the compute set id and a fresh token.
fn generate_job_name(request: &SubmitRequest) -> String {
    let token: [u8; 16] = rand::random();
    format!("VC-JOB-{}-{}", request.computeset, hex::encode(token))
}

/// Build the scheduler submission command, wrapped in an external timeout.
///
/// `--workdir=/tmp` leaves the job output file on the execution host.
/// `--signal=B:USR1@60` makes the scheduler signal the job script before the
/// walltime stop so it can request shutdown of the virtual nodes. The
/// remaining parameters are part of the submission contract and must not
/// change.
pub fn build_submit_argv(name: &str, request: &SubmitRequest) -> Vec<String> {
    vec![
        config::timeout_path(),
        config::SUBMIT_TIMEOUT_SECS.to_string(),
        config::sbatch_path(),
        format!("--job-name={name}"),
        format!("--output={name}.out"),
        format!("--uid={}", request.user),
        format!("--account={}", request.account),
        format!("--workdir={}", config::JOB_WORKDIR),
        "--parsable".to_string(),
        format!("--partition={}", config::partition()),
        format!("--nodes={0}-{0}", request.node_count),
        "--ntasks-per-node=1".to_string(),
        format!("--cpus-per-task={}", config::CPUS_PER_TASK),
        format!("--signal=B:USR1@{}", config::SIGNAL_LEAD_SECS),
        format!("--time={}", request.walltime_mins),
        config::JOB_SCRIPT.to_string(),
        request.walltime_mins.to_string(),
    ]
}

/// Extract the scheduler-assigned job id from `--parsable` output.
///
/// The first `;`-separated field of the first line must be a non-empty
/// decimal string; anything else is rejected rather than stored.
pub fn parse_job_id(stdout: &str) -> anyhow::Result<JobId> {
    let line = stdout.trim().lines().next().unwrap_or("");
    let id = line.split(';').next().unwrap_or("");
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id.to_string())
    } else {
        anyhow::bail!("Missing job id in scheduler output\n{stdout}")
    }
}

/// Submit one scheduler job for the request and hand the outcome to the
/// reconciler through the fabric.
pub async fn submit_job(
    executor: &dyn CommandExecutor,
    fabric: &dyn Dispatcher,
    request: SubmitRequest,
) {
    let name = generate_job_name(&request);
    let argv = build_submit_argv(&name, &request);

    let mut update = JobUpdate::new(request.computeset);
    update.name = Some(name.clone());
    update.user = Some(request.user);
    update.account = Some(request.account);
    update.node_count = Some(request.node_count);
    update.walltime_mins = Some(request.walltime_mins);

    let result = match executor.run(argv).await {
        Ok(output) => check_output(output),
        Err(error) => Err(error),
    };
    match result.and_then(|output| Ok(parse_job_id(&output.stdout)?)) {
        Ok(jobid) => {
            log::debug!("Job {name} submitted as {jobid}");
            update.jobid = Some(jobid);
            update.state = Some(JobState::Submitted);
        }
        Err(error) => {
            log::error!("Submission of job {name} failed: {error}");
            update.state = Some(JobState::Failed);
            update.error = Some(error.to_string());
        }
    }
    fabric.dispatch(TaskMessage::UpdateJob(update));
}
