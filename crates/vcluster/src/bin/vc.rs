use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use vcluster::common::setup::setup_logging;
use vcluster::exec::{CommandExecutor, ProcessExecutor};
use vcluster::fabric::LocalFabric;
use vcluster::server::config;
use vcluster::server::inventory::{CommandSnapshotSource, SnapshotSource};
use vcluster::server::process::{agent_process, orchestrator_process};
use vcluster::store::Store;
use vcluster::store::memory::MemoryStore;

#[derive(Parser)]
#[command(
    name = "vc",
    about = "Virtual compute cluster provisioning driven by a batch scheduler"
)]
struct RootOptions {
    /// Use a verbose output (log level DEBUG).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(clap::Subcommand)]
enum SubCommand {
    /// Run the orchestrator and frontend-agent roles in one process, wired
    /// by an in-process fabric.
    Serve(ServeOpts),
}

#[derive(Parser)]
struct ServeOpts {
    /// How often to collect and merge a fleet snapshot.
    #[arg(long, value_parser = humantime::parse_duration)]
    refresh_interval: Option<Duration>,

    /// Command producing a JSON fleet snapshot on stdout.
    #[arg(long)]
    probe: Option<String>,
}

async fn command_serve(opts: ServeOpts) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessExecutor);
    let (fabric, agent_rx, orchestrator_rx) = LocalFabric::new();
    let fabric = Arc::new(fabric);

    let source: Option<Box<dyn SnapshotSource>> = opts
        .probe
        .map(|probe| {
            probe
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|argv| !argv.is_empty())
        .map(|argv| {
            Box::new(CommandSnapshotSource::new(executor.clone(), argv)) as Box<dyn SnapshotSource>
        });
    let interval = opts
        .refresh_interval
        .unwrap_or_else(config::inventory_refresh_interval);

    log::info!(
        "vcluster serving on {}",
        gethostname::gethostname().to_string_lossy()
    );
    tokio::join!(
        orchestrator_process(
            store.clone(),
            fabric.clone(),
            source,
            interval,
            orchestrator_rx
        ),
        agent_process(executor, fabric, agent_rx),
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = RootOptions::parse();
    setup_logging(opts.debug);
    match opts.subcmd {
        SubCommand::Serve(serve) => command_serve(serve).await,
    }
}
